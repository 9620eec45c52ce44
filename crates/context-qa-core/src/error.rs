//! Error kinds raised by the retrieval core.

use thiserror::Error;

/// Failure of a segmentation or ranking call.
///
/// Both variants are caller errors: they are surfaced immediately and
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// A parameter is out of range (e.g. a segment size of zero).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation needs state that is not there (e.g. ranking with no segments).
    #[error("invalid state: {0}")]
    InvalidState(String),
}
