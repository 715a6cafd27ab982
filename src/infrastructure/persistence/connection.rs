use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::infrastructure::persistence::error::DbError;
use crate::utils::logging;

/// Pooled connection to the marketplace relational store
///
/// One pool serves the repositories, the job queue and the change-capture
/// sources; SeaORM's `DatabaseConnection` is itself a pool handle, so
/// clones of the inner connection share it.
pub struct DbPool {
    connection: Arc<DatabaseConnection>,
}

impl DbPool {
    /// Connect to the relational store named by `DATABASE_URL`
    pub async fn new(config: &AppConfig) -> Result<Self, DbError> {
        logging::log_info(&format!(
            "Connecting to relational store: {}",
            config.database.url
        ));

        let connection = Database::connect(&config.database.url)
            .await
            .map_err(|e| {
                DbError::ConnectionError(format!("Relational store unreachable: {}", e))
            })?;
        logging::log_info("Relational store connection established");
        Ok(DbPool {
            connection: Arc::new(connection),
        })
    }

    /// Handle to the shared pool
    pub fn get_connection(&self) -> &Arc<DatabaseConnection> {
        &self.connection
    }
}
