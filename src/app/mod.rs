mod error;

pub use error::{AppError, FieldErrors};

use std::sync::Arc;

use actix_web::web;
use chrono::Duration;
use diesel::sqlite::SqliteConnection;

use crate::{
    config::Config,
    database::db_utils::{DbConn, DbPool},
    uploads::UploadStore,
};

/** Used for storing the database connections when handling requests */
pub struct AppState {
    pub db_pool: Arc<DbPool>,
    pub uploads: UploadStore,
    pub token_ttl: Option<Duration>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            db_pool: self.db_pool.clone(),
            uploads: self.uploads.clone(),
            token_ttl: self.token_ttl,
        }
    }
}

impl AppState {
    pub fn new(db_pool: DbPool, config: &Config) -> AppState {
        AppState {
            db_pool: Arc::new(db_pool),
            uploads: UploadStore::new(config.storage_root.clone()),
            token_ttl: config.token_expiration_minutes.map(Duration::minutes),
        }
    }

    /** Checks a connection out of the pool */
    pub fn db(&self) -> Result<DbConn, AppError> {
        Ok(self.db_pool.get()?)
    }

    /// Runs `work` on the blocking thread pool with a connection of its own.
    /// The connection goes back to the pool before the future resolves.
    pub async fn with_db<F, R>(&self, work: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<R, AppError> + Send + 'static,
        R: Send + 'static,
    {
        let state = self.clone();
        web::block(move || {
            let mut conn = state.db()?;
            work(&mut conn)
        })
        .await?
    }
}
