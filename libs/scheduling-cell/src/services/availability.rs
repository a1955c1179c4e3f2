use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use shared_database::rows::{fmt_dt, parse_dt, parse_uuid};
use shared_database::Db;

use catalog_cell::services::catalog::CatalogService;

use crate::models::{Employee, SchedulingError, SlotAvailability, SlotListing, SlotQuery};
use crate::services::duration::DurationResolver;
use crate::services::schedule::ScheduleService;
use crate::services::slots::generate_slots;
use crate::services::staff::StaffService;

/// Half-open interval intersection.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// An existing booking reduced to the data overlap checks need.
#[derive(Debug, Clone)]
pub struct BookingInterval {
    pub employee_id: Uuid,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl BookingInterval {
    /// Buffer is added symmetrically so back-to-back jobs always leave the
    /// configured gap.
    pub fn blocks(&self, slot_start: DateTime<Utc>, slot_end: DateTime<Utc>, buffer_minutes: i64) -> bool {
        let padded_start = self.start - Duration::minutes(buffer_minutes);
        let padded_end =
            self.start + Duration::minutes(self.duration_minutes + buffer_minutes);
        overlaps(padded_start, padded_end, slot_start, slot_end)
    }
}

/// Bookings that can block slots on `date` for the given employees.
/// Cancelled bookings never block; completed and no_show keep blocking their
/// original interval. The range is widened by a day on each side so padded
/// intervals that cross midnight are still seen.
pub fn load_blocking_intervals(
    conn: &Connection,
    employee_ids: &[Uuid],
    date: NaiveDate,
    exclude_booking_id: Option<Uuid>,
) -> rusqlite::Result<Vec<BookingInterval>> {
    if employee_ids.is_empty() {
        return Ok(Vec::new());
    }

    let id_list = employee_ids
        .iter()
        .map(|id| format!("'{}'", id))
        .collect::<Vec<_>>()
        .join(",");
    let range_start = fmt_dt((date - Duration::days(1)).and_hms_opt(0, 0, 0).unwrap().and_utc());
    let range_end = fmt_dt((date + Duration::days(2)).and_hms_opt(0, 0, 0).unwrap().and_utc());
    let exclude = exclude_booking_id
        .map(|id| id.to_string())
        .unwrap_or_default();

    let sql = format!(
        "SELECT employee_id, appointment_start, duration_minutes
         FROM bookings
         WHERE employee_id IN ({})
           AND status != 'cancelled'
           AND appointment_start >= ?1 AND appointment_start < ?2
           AND id != ?3
         ORDER BY appointment_start ASC",
        id_list
    );

    let mut stmt = conn.prepare(&sql)?;
    let intervals = stmt
        .query_map(rusqlite::params![range_start, range_end, exclude], |row| {
            Ok(BookingInterval {
                employee_id: parse_uuid(0, row.get(0)?)?,
                start: parse_dt(1, row.get(1)?)?,
                duration_minutes: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(intervals)
}

/// Re-check used by the booking write path inside its transaction: true when
/// the employee has no blocking booking overlapping the padded slot.
pub fn employee_is_free(
    conn: &Connection,
    employee_id: Uuid,
    slot_start: DateTime<Utc>,
    duration_minutes: i64,
    buffer_minutes: i64,
    exclude_booking_id: Option<Uuid>,
) -> rusqlite::Result<bool> {
    let intervals = load_blocking_intervals(
        conn,
        &[employee_id],
        slot_start.date_naive(),
        exclude_booking_id,
    )?;
    let slot_end = slot_start + Duration::minutes(duration_minutes);
    Ok(intervals
        .iter()
        .all(|interval| !interval.blocks(slot_start, slot_end, buffer_minutes)))
}

/// The slot read path: resolve duration, generate the candidate grid, narrow
/// the staff pool, and flag each candidate with whether at least one eligible
/// employee is free for it.
pub struct AvailabilityService {
    db: Db,
    max_extras_per_booking: usize,
}

impl AvailabilityService {
    pub fn new(db: Db, max_extras_per_booking: usize) -> Self {
        Self {
            db,
            max_extras_per_booking,
        }
    }

    pub fn get_available_slots(
        &self,
        query: &SlotQuery,
        now: DateTime<Utc>,
    ) -> Result<SlotListing, SchedulingError> {
        let resolver = DurationResolver::new(
            CatalogService::new(self.db.clone()),
            self.max_extras_per_booking,
        );
        let resolved = resolver.resolve(query.service_id, query.pricing_tier_id, &query.extras)?;
        let duration_minutes = resolved.total_minutes;

        let schedule = ScheduleService::new(self.db.clone()).effective_for_service(query.service_id)?;
        let starts = generate_slots(&schedule, query.date, duration_minutes, now)?;

        let pool = StaffService::new(self.db.clone())
            .eligible_employees(query.service_id, query.gender_preference)?;
        if pool.is_empty() {
            // Distinguishes "no staff of that gender" from "fully booked".
            return Err(SchedulingError::NoEligibleStaff);
        }

        let intervals = {
            let conn = self.db.conn();
            let ids: Vec<Uuid> = pool.iter().map(|e| e.id).collect();
            load_blocking_intervals(&conn, &ids, query.date, query.exclude_booking_id)?
        };

        let slots = starts
            .into_iter()
            .map(|start| {
                let slot_start = query.date.and_time(start).and_utc();
                let slot_end = slot_start + Duration::minutes(duration_minutes);
                let available = some_employee_free(
                    &pool,
                    &intervals,
                    slot_start,
                    slot_end,
                    schedule.buffer_time_minutes,
                );
                SlotAvailability { start, available }
            })
            .collect::<Vec<_>>();

        debug!(
            "slot listing for service {} on {}: {} candidates, {} available",
            query.service_id,
            query.date,
            slots.len(),
            slots.iter().filter(|s| s.available).count()
        );

        Ok(SlotListing {
            date: query.date,
            duration_minutes,
            slots,
        })
    }
}

fn some_employee_free(
    pool: &[Employee],
    intervals: &[BookingInterval],
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
    buffer_minutes: i64,
) -> bool {
    pool.iter().any(|employee| {
        intervals
            .iter()
            .filter(|interval| interval.employee_id == employee.id)
            .all(|interval| !interval.blocks(slot_start, slot_end, buffer_minutes))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> DateTime<Utc> {
        let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap();
        naive.and_utc()
    }

    #[test]
    fn overlap_is_half_open() {
        // Touching endpoints do not overlap.
        assert!(!overlaps(
            dt("2026-03-03 09:00"),
            dt("2026-03-03 10:00"),
            dt("2026-03-03 10:00"),
            dt("2026-03-03 11:00"),
        ));
        assert!(overlaps(
            dt("2026-03-03 09:00"),
            dt("2026-03-03 10:01"),
            dt("2026-03-03 10:00"),
            dt("2026-03-03 11:00"),
        ));
    }

    #[test]
    fn buffer_pads_booked_interval_symmetrically() {
        let interval = BookingInterval {
            employee_id: Uuid::new_v4(),
            start: dt("2026-03-03 10:00"),
            duration_minutes: 60,
        };

        // Booking occupies 10:00-11:00; with a 15-minute buffer it blocks
        // [09:45, 11:15).
        let slot = |s: &str| (dt(s), dt(s) + Duration::minutes(60));

        let (s, e) = slot("2026-03-03 08:45");
        assert!(!interval.blocks(s, e, 15)); // ends 09:45, touches the pad
        let (s, e) = slot("2026-03-03 08:46");
        assert!(interval.blocks(s, e, 15));
        let (s, e) = slot("2026-03-03 11:15");
        assert!(!interval.blocks(s, e, 15)); // starts exactly at pad end
        let (s, e) = slot("2026-03-03 11:14");
        assert!(interval.blocks(s, e, 15));
    }

    #[test]
    fn slot_free_when_any_pool_member_is_free() {
        let busy = Uuid::new_v4();
        let free = Uuid::new_v4();
        let pool = vec![
            Employee {
                id: busy,
                full_name: "Busy".to_string(),
                gender: crate::models::Gender::Female,
                is_active: true,
            },
            Employee {
                id: free,
                full_name: "Free".to_string(),
                gender: crate::models::Gender::Female,
                is_active: true,
            },
        ];
        let intervals = vec![BookingInterval {
            employee_id: busy,
            start: dt("2026-03-03 10:00"),
            duration_minutes: 60,
        }];

        let slot_start = dt("2026-03-03 10:00");
        let slot_end = slot_start + Duration::minutes(60);
        assert!(some_employee_free(&pool, &intervals, slot_start, slot_end, 15));

        let solo = &pool[..1];
        assert!(!some_employee_free(solo, &intervals, slot_start, slot_end, 15));
    }

    #[test]
    fn excluded_booking_does_not_block_itself() {
        let db = shared_database::Db::open_in_memory().unwrap();
        let service_id = shared_utils::test_utils::seed_service(&db, "Nursing", 60, 500.0);
        let employee_id = shared_utils::test_utils::seed_employee(&db, "Anna", "female");
        shared_utils::test_utils::assign_service(&db, employee_id, service_id);

        let booking_id = Uuid::new_v4();
        let start = dt("2026-03-03 10:00");
        db.conn()
            .execute(
                "INSERT INTO bookings
                     (id, customer_id, service_id, employee_id, appointment_start,
                      duration_minutes, total_amount, status, payment_status,
                      gender_preference, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 60, 500.0, 'confirmed', 'paid',
                         'no_preference', ?6, ?6)",
                rusqlite::params![
                    booking_id.to_string(),
                    Uuid::new_v4().to_string(),
                    service_id.to_string(),
                    employee_id.to_string(),
                    fmt_dt(start),
                    fmt_dt(Utc::now()),
                ],
            )
            .unwrap();

        let conn = db.conn();
        assert!(!employee_is_free(&conn, employee_id, start, 60, 15, None).unwrap());
        // The booking being rescheduled must not count against itself.
        assert!(employee_is_free(&conn, employee_id, start, 60, 15, Some(booking_id)).unwrap());
    }
}
