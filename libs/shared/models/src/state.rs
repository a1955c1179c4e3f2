use shared_config::AppConfig;
use shared_database::locks::EmployeeDayLocks;
use shared_database::Db;

/// Shared application state handed to every cell router.
pub struct AppState {
    pub config: AppConfig,
    pub db: Db,
    pub locks: EmployeeDayLocks,
}

impl AppState {
    pub fn new(config: AppConfig, db: Db) -> Self {
        Self {
            config,
            db,
            locks: EmployeeDayLocks::new(),
        }
    }
}
