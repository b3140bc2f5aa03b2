use thiserror::Error;

/// Errors raised while converting raw script values into core types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("event kind {0} is out of range (0..{max})", max = crate::EventKind::COUNT)]
    InvalidEventKind(i32),
}
