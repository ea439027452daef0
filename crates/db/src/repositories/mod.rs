use async_trait::async_trait;
use thiserror::Error;

use intake_core::domain::session::{Session, SessionId};
use intake_core::errors::ApplicationError;

pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Session store. One session per id; `save` replaces whatever was stored.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    async fn save(&self, session: Session) -> Result<(), RepositoryError>;
    /// Returns whether a session was removed.
    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError>;
    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError>;
}
