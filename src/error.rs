//! Layout error taxonomy
//!
//! Every failure the engine reports carries a kind and a human-readable
//! message. Errors never cross the worker boundary as panics; the host and the
//! registry convert them into `LayoutError` values.

use std::any::Any;

use thiserror::Error;

/// Errors that can occur while computing a layout
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Node list, edge list or option set is malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No layout is registered under the requested identifier
    #[error("unknown layout: {0}")]
    UnknownLayout(String),

    /// The layout computation itself failed
    #[error("layout execution failed: {0}")]
    ExecutionFailure(String),

    /// The execution host is already running a request
    #[error("layout host is busy with another request")]
    HostBusy,
}

/// Coarse classification of a [`LayoutError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UnknownLayout,
    ExecutionFailure,
    HostBusy,
}

impl LayoutError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::ExecutionFailure(msg.into())
    }

    /// The kind of this error, for callers that branch on failure class
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UnknownLayout(_) => ErrorKind::UnknownLayout,
            Self::ExecutionFailure(_) => ErrorKind::ExecutionFailure,
            Self::HostBusy => ErrorKind::HostBusy,
        }
    }
}

/// Result type for layout operations
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_error_display() {
        let err = LayoutError::UnknownLayout("spiral".to_string());
        assert_eq!(err.to_string(), "unknown layout: spiral");

        let err = LayoutError::invalid("damping must be in (0, 1]");
        assert_eq!(err.to_string(), "invalid input: damping must be in (0, 1]");

        assert_eq!(
            LayoutError::HostBusy.to_string(),
            "layout host is busy with another request"
        );
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(LayoutError::invalid("x").kind(), ErrorKind::InvalidInput);
        assert_eq!(
            LayoutError::UnknownLayout("x".into()).kind(),
            ErrorKind::UnknownLayout
        );
        assert_eq!(
            LayoutError::execution("x").kind(),
            ErrorKind::ExecutionFailure
        );
        assert_eq!(LayoutError::HostBusy.kind(), ErrorKind::HostBusy);
    }

    fn payload_of(f: impl FnOnce() + std::panic::UnwindSafe) -> Box<dyn Any + Send> {
        std::panic::catch_unwind(f).unwrap_err()
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload = payload_of(|| panic!("static message"));
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = payload_of(|| panic!("formatted {}", 42));
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
