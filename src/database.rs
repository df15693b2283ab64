use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::StoreError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Writers wait this long on a locked database before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Opens a fresh connection per operation against a single SQLite file.
#[derive(Clone)]
pub struct Database {
    url: Arc<str>,
}

impl Database {
    pub fn new(url: &str) -> Self {
        Database { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn establish_connection(&self) -> Result<SqliteConnection, StoreError> {
        let mut connection = SqliteConnection::establish(&self.url)?;

        connection
            .batch_execute(&format!(
                "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
                BUSY_TIMEOUT_MS
            ))
            .map_err(StoreError::Query)?;

        Ok(connection)
    }

    /// Runs `work` against a fresh connection on tokio's blocking pool so
    /// diesel's synchronous calls never stall the async runtime.
    pub async fn run<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let database = self.clone();

        tokio::task::spawn_blocking(move || {
            let connection = &mut database.establish_connection()?;

            work(connection)
        })
        .await
        .map_err(|e| E::from(StoreError::Task(e)))?
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        let connection = &mut self.establish_connection()?;

        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        for version in applied {
            log::info!("Applied migration {}.", version);
        }

        Ok(())
    }
}

/// Current UTC time as stored in every timestamp column.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_database;
    use crate::error::StoreError;
    use crate::schema::jobs;
    use diesel::prelude::*;

    #[test]
    fn migrations_create_an_empty_jobs_table() {
        let (_dir, database) = temp_database();
        let connection = &mut database.establish_connection().unwrap();

        let count: i64 = jobs::table.count().get_result(connection).unwrap();

        assert_eq!(count, 0);
    }

    #[test]
    fn running_migrations_twice_is_a_no_op() {
        let (_dir, database) = temp_database();

        database.run_migrations().unwrap();
    }

    #[tokio::test]
    async fn run_hands_work_a_configured_connection() {
        let (_dir, database) = temp_database();

        let (count, foreign_keys) = database
            .run(|connection| -> Result<(i64, i32), StoreError> {
                let count = jobs::table.count().get_result(connection)?;
                let foreign_keys = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>(
                    "foreign_keys FROM pragma_foreign_keys()",
                ))
                .get_result(connection)?;

                Ok((count, foreign_keys))
            })
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(foreign_keys, 1);
    }
}
