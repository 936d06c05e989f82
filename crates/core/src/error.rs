use std::fmt;

use crate::cursor::{CursorError, Tag};

/// Result alias that carries the custom [`DemoError`] type.
pub type Result<T> = std::result::Result<T, DemoError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// Free-form failure raised by effects and the driver layer.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The scene file could not be decoded. The scene is unusable as a whole.
    #[error("scene decode failed: {0}")]
    Decode(#[from] DecodeError),
    /// The playback configuration is not valid JSON for [`crate::AppConfig`].
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl DemoError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for DemoError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for DemoError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Fatal scene decoding failure.
///
/// Carries the byte offset at which decoding stopped and, once the decoder has
/// seen it, the chunk kind and object name that were being read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub offset: usize,
    pub context: Option<String>,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            context: None,
        }
    }

    /// Attaches context unless a more specific one was already recorded.
    pub fn with_context(mut self, context: impl FnOnce() -> String) -> Self {
        if self.context.is_none() {
            self.context = Some(context());
        }
        self
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.kind, self.offset)?;
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        Ok(())
    }
}

impl From<CursorError> for DecodeError {
    fn from(value: CursorError) -> Self {
        match value {
            CursorError::OutOfBounds {
                offset,
                requested,
                available,
            } => Self::new(
                DecodeErrorKind::OutOfBounds {
                    requested,
                    available,
                },
                offset,
            ),
        }
    }
}

/// Classification of fatal decode failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeErrorKind {
    #[error("read of {requested} bytes past end of buffer ({available} available)")]
    OutOfBounds { requested: usize, available: usize },
    #[error("unknown chunk tag `{0}`")]
    UnknownChunkTag(Tag),
    #[error("{what} index {index} out of range (limit {limit})")]
    InvalidReference {
        what: &'static str,
        index: i64,
        limit: usize,
    },
    #[error("sub-materials nested deeper than {depth} levels")]
    NestingTooDeep { depth: usize },
    #[error("invalid {what} code {value}")]
    InvalidEnum { what: &'static str, value: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display_includes_offset_and_context() {
        let err = DecodeError::new(
            DecodeErrorKind::UnknownChunkTag(Tag(*b"ABCD")),
            96,
        )
        .with_context(|| "geometry `cube`".to_string());

        let text = err.to_string();
        assert!(text.contains("ABCD"));
        assert!(text.contains("96"));
        assert!(text.contains("cube"));
    }

    #[test]
    fn first_context_wins() {
        let err = DecodeError::new(DecodeErrorKind::NestingTooDeep { depth: 16 }, 0)
            .with_context(|| "material `inner`".to_string())
            .with_context(|| "material list".to_string());

        assert_eq!(err.context.as_deref(), Some("material `inner`"));
    }

    #[test]
    fn wraps_decode_errors_into_demo_error() {
        let err: DemoError = DecodeError::new(
            DecodeErrorKind::OutOfBounds {
                requested: 4,
                available: 1,
            },
            10,
        )
        .into();

        assert!(format!("{err}").contains("byte 10"));
    }
}
