use thiserror::Error;

use crate::stacks::ClientError;

#[derive(Debug, Error)]
pub enum StampError {
    /// Missing or unusable keys, content, or settings. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),
    /// Receipt text rejected before any network call.
    #[error("invalid receipt text: {0}")]
    Validation(String),
    #[error("failed to build contract call: {0}")]
    Build(#[source] ClientError),
    #[error("transaction rejected: {reason}")]
    Broadcast { reason: String, txid: Option<String> },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StampError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StampError::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether another stamp attempt for the same item could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StampError::Build(_) | StampError::Broadcast { .. })
    }
}
