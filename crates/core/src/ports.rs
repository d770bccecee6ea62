//! Seams to the outside world: persisted state and the chat backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::message::UserId;
use crate::errors::{SendError, StoreError};

/// Key/value state that outlives the process.
///
/// There are no transactions; callers serialize their own read-modify-write cycles.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Delivers the automated reply for one user in one channel.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, channel_id: &str, user_id: &UserId) -> Result<(), SendError>;
}

#[async_trait]
impl<T> StateStore for std::sync::Arc<T>
where
    T: StateStore + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }
}

#[async_trait]
impl<T> MessageSender for std::sync::Arc<T>
where
    T: MessageSender + ?Sized,
{
    async fn send(&self, channel_id: &str, user_id: &UserId) -> Result<(), SendError> {
        (**self).send(channel_id, user_id).await
    }
}
