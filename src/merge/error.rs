use thiserror::Error;

use super::types::{Instant, Stream};

/// A single input record that could not be turned into a usable value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed {stream} record #{index}: {reason}")]
pub struct MalformedRecord {
    pub stream: Stream,
    pub index: usize,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(stream: Stream, index: usize, reason: impl Into<String>) -> Self {
        Self {
            stream,
            index,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("{stream} out of order at record #{index}: {current} precedes {previous}")]
    OrderingViolation {
        stream: Stream,
        index: usize,
        previous: Instant,
        current: Instant,
    },

    #[error(transparent)]
    Malformed(#[from] MalformedRecord),
}

pub type MergeResult<T> = Result<T, MergeError>;
