use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("invalid office hours: {0}")]
    InvalidOfficeHours(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
    #[error("state entry `{key}` could not be decoded: {detail}")]
    Decode { key: String, detail: String },
    #[error("state entry `{key}` could not be encoded: {detail}")]
    Encode { key: String, detail: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("chat backend rejected message: {0}")]
    Rejected(String),
    #[error("chat backend unreachable: {0}")]
    Transport(String),
    #[error("send timed out after {0}s")]
    Timeout(u64),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Store and backend failures heal on the next scheduled run.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Unavailable(_))
                | Self::Send(SendError::Transport(_))
                | Self::Send(SendError::Timeout(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, SendError, StoreError};

    #[test]
    fn store_outage_is_transient() {
        let error = ApplicationError::from(StoreError::Unavailable("database locked".to_owned()));
        assert!(error.is_transient());
    }

    #[test]
    fn send_timeout_is_transient_but_rejection_is_not() {
        assert!(ApplicationError::from(SendError::Timeout(10)).is_transient());
        assert!(!ApplicationError::from(SendError::Rejected("channel_not_found".to_owned()))
            .is_transient());
    }

    #[test]
    fn domain_errors_render_their_detail() {
        let error = ApplicationError::from(DomainError::InvalidMessage(
            "`channel_id` must not be empty".to_owned(),
        ));
        assert!(!error.is_transient());
        assert_eq!(error.to_string(), "invalid message: `channel_id` must not be empty");
    }
}
