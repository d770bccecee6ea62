use thiserror::Error;

use deskbot_core::errors::StoreError;

pub mod memory;
pub mod state;

pub use memory::InMemoryStateStore;
pub use state::SqlStateStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error for `{key}`: {detail}")]
    Decode { key: String, detail: String },
    #[error("encode error for `{key}`: {detail}")]
    Encode { key: String, detail: String },
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(source) => StoreError::Unavailable(source.to_string()),
            RepositoryError::Decode { key, detail } => StoreError::Decode { key, detail },
            RepositoryError::Encode { key, detail } => StoreError::Encode { key, detail },
        }
    }
}
