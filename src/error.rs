use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the queue, producer and dispatcher.
///
/// Only [`DispatchError::Canceled`] and [`DispatchError::QueueClosed`] end a
/// pipeline loop. Everything else is recovered per item.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("operation canceled")]
    Canceled,

    #[error("queue has been completed and accepts no more items")]
    QueueClosed,

    #[error("work item has an empty url")]
    InvalidItem,

    #[error("response payload already attached to work item {0}")]
    PayloadAlreadySet(Uuid),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled | Self::Transport(TransportError::Canceled))
    }
}

/// Failures reported by a [`crate::transport::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request canceled")]
    Canceled,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to build http client: {0}")]
    Client(String),
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_canceled() {
        assert!(DispatchError::Canceled.is_canceled());
        assert!(DispatchError::Transport(TransportError::Canceled).is_canceled());
        assert!(!DispatchError::QueueClosed.is_canceled());
        assert!(!DispatchError::Transport(TransportError::Network("reset".into())).is_canceled());
    }

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        assert_eq!(
            DispatchError::PayloadAlreadySet(id).to_string(),
            format!("response payload already attached to work item {id}")
        );
        assert_eq!(
            DispatchError::from(TransportError::Network("timed out".into())).to_string(),
            "network error: timed out"
        );
    }
}
