//! Error types.
//!
//! Failures are rare by construction: reading a path that does not exist
//! yields [`Value::NotFound`](crate::Value::NotFound) rather than an error.
//! What remains are invalid state transitions requested by the caller.

use thiserror::Error;

/// Errors raised by atoms and lockable values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataverseError {
    /// `lock` was called while a lock is already held.
    #[error("value is already locked")]
    AlreadyLocked,

    /// An in-place array write addressed a slot past the end.
    #[error("index {index} is out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, DataverseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(DataverseError::AlreadyLocked.to_string(), "value is already locked");
        assert_eq!(
            DataverseError::IndexOutOfBounds { index: 4, len: 2 }.to_string(),
            "index 4 is out of bounds for array of length 2"
        );
    }
}
