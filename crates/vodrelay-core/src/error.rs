//! Error types.
//!
//! All failures in the pipeline are expressed as `RelayError`. The engine's
//! retry boundary only needs one question answered: is this worth retrying?
//! Transport and submission failures are transient; a probe or split failure
//! on the same input will fail the same way every time, and a disk-space
//! shortfall will not fix itself between attempts.

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("remote transport error: {0}")]
    Transport(String),

    #[error("insufficient disk space: {available} bytes available, {required} bytes required")]
    Space { available: u64, required: u64 },

    #[error("media probe failed: {0}")]
    MediaProbe(String),

    #[error("split failed: {0}")]
    Split(String),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    /// Whether the per-video retry loop should attempt this again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::Transport(_) | RelayError::Submission(_) | RelayError::Io(_)
        )
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(RelayError::Transport("timeout".into()).is_retryable());
        assert!(RelayError::Submission("exit code 1".into()).is_retryable());
        assert!(!RelayError::MediaProbe("bad container".into()).is_retryable());
        assert!(!RelayError::Split("segment missing".into()).is_retryable());
        assert!(!RelayError::Space {
            available: 1,
            required: 2
        }
        .is_retryable());
        assert!(!RelayError::Cancelled.is_retryable());
    }
}
