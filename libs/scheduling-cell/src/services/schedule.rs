use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::rows::{fmt_time, parse_time, parse_uuid};
use shared_database::Db;

use crate::models::{
    BreakWindow, CreateScheduleRequest, EffectiveSchedule, ScheduleConfig, ScheduleOverride,
    SchedulingError, SetOverrideRequest,
};

pub struct ScheduleService {
    db: Db,
}

impl ScheduleService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a schedule configuration and mark it as the default. Invariants
    /// on the working window and break list are enforced here so the slot
    /// generator can trust its inputs.
    pub fn create_schedule(
        &self,
        request: CreateScheduleRequest,
    ) -> Result<ScheduleConfig, SchedulingError> {
        validate_schedule_shape(
            request.start_time,
            request.end_time,
            &request.working_days,
            &request.breaks,
        )?;
        if request.buffer_time_minutes <= 0 {
            return Err(SchedulingError::ValidationError(
                "Buffer time must be positive".to_string(),
            ));
        }
        if request.min_advance_hours < 0 || request.max_advance_days < 0 {
            return Err(SchedulingError::ValidationError(
                "Booking window bounds cannot be negative".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let days = join_days(&request.working_days);
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction().map_err(SchedulingError::from)?;
            tx.execute("UPDATE schedule_configs SET is_default = 0 WHERE is_default = 1", [])?;
            tx.execute(
                "INSERT INTO schedule_configs
                     (id, name, min_advance_hours, max_advance_days, buffer_time_minutes,
                      start_time, end_time, working_days, is_default)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
                params![
                    id.to_string(),
                    request.name,
                    request.min_advance_hours,
                    request.max_advance_days,
                    request.buffer_time_minutes,
                    fmt_time(request.start_time),
                    fmt_time(request.end_time),
                    days,
                ],
            )?;
            for window in &request.breaks {
                tx.execute(
                    "INSERT INTO schedule_breaks (id, schedule_id, start_time, end_time)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        Uuid::new_v4().to_string(),
                        id.to_string(),
                        fmt_time(window.start_time),
                        fmt_time(window.end_time),
                    ],
                )?;
            }
            tx.commit().map_err(SchedulingError::from)?;
        }

        info!("schedule config {} created", id);
        self.get_schedule(id)
    }

    pub fn get_schedule(&self, schedule_id: Uuid) -> Result<ScheduleConfig, SchedulingError> {
        let conn = self.db.conn();
        let mut config = conn
            .query_row(
                "SELECT id, name, min_advance_hours, max_advance_days, buffer_time_minutes,
                        start_time, end_time, working_days, is_default
                 FROM schedule_configs WHERE id = ?1",
                params![schedule_id.to_string()],
                schedule_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => SchedulingError::NotFound("schedule config"),
                other => SchedulingError::DatabaseError(other.to_string()),
            })?;
        config.breaks = load_breaks(&conn, schedule_id)?;
        Ok(config)
    }

    pub fn default_schedule(&self) -> Result<ScheduleConfig, SchedulingError> {
        let id = {
            let conn = self.db.conn();
            conn.query_row(
                "SELECT id FROM schedule_configs WHERE is_default = 1 ORDER BY rowid DESC LIMIT 1",
                [],
                |row| parse_uuid(0, row.get(0)?),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => SchedulingError::NotFound("schedule config"),
                other => SchedulingError::DatabaseError(other.to_string()),
            })?
        };
        self.get_schedule(id)
    }

    /// Store (or replace) the partial override applied when slots are
    /// computed for a specific service.
    pub fn set_service_override(
        &self,
        schedule_id: Uuid,
        request: SetOverrideRequest,
    ) -> Result<(), SchedulingError> {
        let base = self.get_schedule(schedule_id)?;
        let effective = base.resolve(Some(&request.fields));
        validate_schedule_shape(
            effective.start_time,
            effective.end_time,
            &effective.working_days,
            &base.breaks,
        )?;

        let days = request.fields.working_days.as_deref().map(join_days);
        self.db.conn().execute(
            "INSERT INTO schedule_service_overrides
                 (schedule_id, service_id, min_advance_hours, max_advance_days,
                  buffer_time_minutes, start_time, end_time, working_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(schedule_id, service_id) DO UPDATE SET
                 min_advance_hours = excluded.min_advance_hours,
                 max_advance_days = excluded.max_advance_days,
                 buffer_time_minutes = excluded.buffer_time_minutes,
                 start_time = excluded.start_time,
                 end_time = excluded.end_time,
                 working_days = excluded.working_days",
            params![
                schedule_id.to_string(),
                request.service_id.to_string(),
                request.fields.min_advance_hours,
                request.fields.max_advance_days,
                request.fields.buffer_time_minutes,
                request.fields.start_time.map(fmt_time),
                request.fields.end_time.map(fmt_time),
                days,
            ],
        )?;

        debug!(
            "schedule override stored for service {} on config {}",
            request.service_id, schedule_id
        );
        Ok(())
    }

    /// The schedule used for slot generation for a service: the default
    /// config with any per-service override merged field by field.
    pub fn effective_for_service(
        &self,
        service_id: Uuid,
    ) -> Result<EffectiveSchedule, SchedulingError> {
        let base = self.default_schedule()?;
        let service_override = {
            let conn = self.db.conn();
            conn.query_row(
                "SELECT min_advance_hours, max_advance_days, buffer_time_minutes,
                        start_time, end_time, working_days
                 FROM schedule_service_overrides
                 WHERE schedule_id = ?1 AND service_id = ?2",
                params![base.id.to_string(), service_id.to_string()],
                override_from_row,
            )
            .optional()
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?
        };
        Ok(base.resolve(service_override.as_ref()))
    }
}

fn validate_schedule_shape(
    start_time: chrono::NaiveTime,
    end_time: chrono::NaiveTime,
    working_days: &[u8],
    breaks: &[BreakWindow],
) -> Result<(), SchedulingError> {
    if start_time >= end_time {
        return Err(SchedulingError::ValidationError(
            "Schedule start time must be before end time".to_string(),
        ));
    }
    if working_days.is_empty() || working_days.iter().any(|d| !(1..=7).contains(d)) {
        return Err(SchedulingError::ValidationError(
            "Working days must be weekday numbers 1-7".to_string(),
        ));
    }

    let mut sorted: Vec<&BreakWindow> = breaks.iter().collect();
    sorted.sort_by_key(|w| w.start_time);
    for window in &sorted {
        if window.start_time >= window.end_time {
            return Err(SchedulingError::ValidationError(
                "Break start must be before break end".to_string(),
            ));
        }
        if window.start_time < start_time || window.end_time > end_time {
            return Err(SchedulingError::ValidationError(
                "Break windows must lie within working hours".to_string(),
            ));
        }
    }
    for pair in sorted.windows(2) {
        if pair[1].start_time < pair[0].end_time {
            return Err(SchedulingError::ValidationError(
                "Break windows must not overlap".to_string(),
            ));
        }
    }
    Ok(())
}

fn join_days(days: &[u8]) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_days(value: &str) -> Vec<u8> {
    value
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleConfig> {
    let days: String = row.get(7)?;
    Ok(ScheduleConfig {
        id: parse_uuid(0, row.get(0)?)?,
        name: row.get(1)?,
        min_advance_hours: row.get(2)?,
        max_advance_days: row.get(3)?,
        buffer_time_minutes: row.get(4)?,
        start_time: parse_time(5, row.get(5)?)?,
        end_time: parse_time(6, row.get(6)?)?,
        working_days: parse_days(&days),
        breaks: Vec::new(),
        is_default: row.get(8)?,
    })
}

fn override_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleOverride> {
    let start: Option<String> = row.get(3)?;
    let end: Option<String> = row.get(4)?;
    let days: Option<String> = row.get(5)?;
    Ok(ScheduleOverride {
        min_advance_hours: row.get(0)?,
        max_advance_days: row.get(1)?,
        buffer_time_minutes: row.get(2)?,
        start_time: start.map(|s| parse_time(3, s)).transpose()?,
        end_time: end.map(|s| parse_time(4, s)).transpose()?,
        working_days: days.as_deref().map(parse_days),
    })
}

fn load_breaks(conn: &Connection, schedule_id: Uuid) -> Result<Vec<BreakWindow>, SchedulingError> {
    let mut stmt = conn.prepare(
        "SELECT start_time, end_time FROM schedule_breaks
         WHERE schedule_id = ?1 ORDER BY start_time ASC",
    )?;
    let breaks = stmt
        .query_map(params![schedule_id.to_string()], |row| {
            Ok(BreakWindow {
                start_time: parse_time(0, row.get(0)?)?,
                end_time: parse_time(1, row.get(1)?)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(breaks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use shared_database::Db;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn base_request() -> CreateScheduleRequest {
        CreateScheduleRequest {
            name: "Weekday hours".to_string(),
            min_advance_hours: 2,
            max_advance_days: 30,
            buffer_time_minutes: 15,
            start_time: t("09:00"),
            end_time: t("18:00"),
            working_days: vec![1, 2, 3, 4, 5],
            breaks: vec![BreakWindow {
                start_time: t("13:00"),
                end_time: t("14:00"),
            }],
        }
    }

    #[test]
    fn create_and_resolve_default_schedule() {
        let service = ScheduleService::new(Db::open_in_memory().unwrap());
        let created = service.create_schedule(base_request()).unwrap();

        let fetched = service.default_schedule().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.breaks.len(), 1);
        assert_eq!(fetched.working_days, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_inverted_working_window() {
        let service = ScheduleService::new(Db::open_in_memory().unwrap());
        let mut request = base_request();
        request.start_time = t("18:00");
        request.end_time = t("09:00");
        assert!(matches!(
            service.create_schedule(request),
            Err(SchedulingError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_overlapping_breaks() {
        let service = ScheduleService::new(Db::open_in_memory().unwrap());
        let mut request = base_request();
        request.breaks = vec![
            BreakWindow { start_time: t("12:00"), end_time: t("13:00") },
            BreakWindow { start_time: t("12:30"), end_time: t("14:00") },
        ];
        assert!(matches!(
            service.create_schedule(request),
            Err(SchedulingError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_break_outside_working_hours() {
        let service = ScheduleService::new(Db::open_in_memory().unwrap());
        let mut request = base_request();
        request.breaks = vec![BreakWindow { start_time: t("08:00"), end_time: t("09:30") }];
        assert!(matches!(
            service.create_schedule(request),
            Err(SchedulingError::ValidationError(_))
        ));
    }

    #[test]
    fn override_merges_field_by_field() {
        let db = Db::open_in_memory().unwrap();
        let service = ScheduleService::new(db.clone());
        let created = service.create_schedule(base_request()).unwrap();
        let service_id = shared_utils::test_utils::seed_service(&db, "Nursing visit", 60, 500.0);

        service
            .set_service_override(
                created.id,
                SetOverrideRequest {
                    service_id,
                    fields: ScheduleOverride {
                        buffer_time_minutes: Some(30),
                        end_time: Some(t("17:00")),
                        ..Default::default()
                    },
                },
            )
            .unwrap();

        let effective = service.effective_for_service(service_id).unwrap();
        assert_eq!(effective.buffer_time_minutes, 30);
        assert_eq!(effective.end_time, t("17:00"));
        // Untouched fields come from the base config.
        assert_eq!(effective.start_time, t("09:00"));
        assert_eq!(effective.min_advance_hours, 2);

        let untouched = service.effective_for_service(Uuid::new_v4()).unwrap();
        assert_eq!(untouched.buffer_time_minutes, 15);
    }
}
