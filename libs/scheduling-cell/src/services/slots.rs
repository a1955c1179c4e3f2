use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};

use crate::models::{EffectiveSchedule, SchedulingError};

/// Fixed grid of candidate start times. The step equals the configured
/// buffer time regardless of the requested duration, so slots land on the
/// same grid for every service. Restartable: clone to iterate again.
#[derive(Debug, Clone)]
pub struct SlotGrid {
    cursor: i64,
    last: i64,
    step: i64,
}

impl Iterator for SlotGrid {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        if self.cursor > self.last {
            return None;
        }
        let time = NaiveTime::from_num_seconds_from_midnight_opt(self.cursor as u32 * 60, 0)?;
        self.cursor += self.step;
        Some(time)
    }
}

/// Enumerate start times from start_time through end_time - duration,
/// stepping by buffer_time_minutes.
pub fn candidate_starts(schedule: &EffectiveSchedule, duration_minutes: i64) -> SlotGrid {
    SlotGrid {
        cursor: minutes_of(schedule.start_time),
        last: minutes_of(schedule.end_time) - duration_minutes,
        step: schedule.buffer_time_minutes.max(1),
    }
}

/// Candidate start times for a date, with break windows and the
/// minimum-advance cutoff applied. Date-level bounds (past dates, beyond
/// max_advance_days, non-working weekdays) signal `DateNotBookable`; today
/// itself is permitted and the advance check then works on exact timestamps.
pub fn generate_slots(
    schedule: &EffectiveSchedule,
    date: NaiveDate,
    duration_minutes: i64,
    now: DateTime<Utc>,
) -> Result<Vec<NaiveTime>, SchedulingError> {
    if duration_minutes <= 0 {
        return Err(SchedulingError::InvalidDuration(
            "Slot duration must be positive".to_string(),
        ));
    }

    let today = now.date_naive();
    if date < today {
        return Err(SchedulingError::DateNotBookable(
            "Date is in the past".to_string(),
        ));
    }
    if date > today + Duration::days(schedule.max_advance_days) {
        return Err(SchedulingError::DateNotBookable(format!(
            "Bookings open at most {} days in advance",
            schedule.max_advance_days
        )));
    }
    let weekday = date.weekday().number_from_monday() as u8;
    if !schedule.working_days.contains(&weekday) {
        return Err(SchedulingError::DateNotBookable(
            "Not a working day".to_string(),
        ));
    }

    let earliest_start = now + Duration::hours(schedule.min_advance_hours);

    let slots = candidate_starts(schedule, duration_minutes)
        .filter(|start| !hits_break(schedule, *start, duration_minutes))
        .filter(|start| date.and_time(*start).and_utc() >= earliest_start)
        .collect();

    Ok(slots)
}

fn hits_break(schedule: &EffectiveSchedule, start: NaiveTime, duration_minutes: i64) -> bool {
    let slot_start = minutes_of(start);
    let slot_end = slot_start + duration_minutes;
    schedule.breaks.iter().any(|window| {
        let break_start = minutes_of(window.start_time);
        let break_end = minutes_of(window.end_time);
        slot_start < break_end && break_start < slot_end
    })
}

fn minutes_of(time: NaiveTime) -> i64 {
    (time.num_seconds_from_midnight() / 60) as i64
}
