//! Shared types for the HTTP layer.

use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

/// Router state: cloned into every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run a unit of database work on the blocking pool.
    ///
    /// SQLite calls and the blocking routing client must stay off the
    /// async workers; each call gets its own connection.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&CoreState, &mut Connection) -> Result<T, ApiError> + Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = core.open_db()?;
            f(&core, &mut conn)
        })
        .await?
    }
}

/// Parse a path id, mapping a malformed value to 400.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid {what} id: {raw}")))
}
