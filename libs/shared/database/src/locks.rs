use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// In-process lock registry serializing booking writes per employee-day.
/// Reads never take these locks; granularity never exceeds a single
/// employee-day, so work on unrelated employees or dates is never blocked.
#[derive(Default)]
pub struct EmployeeDayLocks {
    locks: Mutex<HashMap<(Uuid, NaiveDate), Arc<AsyncMutex<()>>>>,
}

impl EmployeeDayLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, employee_id: Uuid, date: NaiveDate) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.locks.lock().unwrap();
            map.entry((employee_id, date))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        debug!("acquiring employee-day lock for {} on {}", employee_id, date);
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn locks_are_independent_per_employee_day() {
        let locks = EmployeeDayLocks::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let _guard_a = locks.acquire(a, day).await;
        // A held lock for one employee must not block another employee's day.
        let _guard_b = locks.acquire(b, day).await;
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(EmployeeDayLocks::new());
        let emp = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let guard = locks.acquire(emp, day).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(emp, day).await;
            })
        };
        // Contender cannot finish while the guard is held.
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }
}
