use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(database: Database, config: Config) -> Self {
        AppState {
            database,
            config: Arc::new(config),
        }
    }
}
