use std::fmt;

use serde::Serialize;

/// Kind of a script execution failure.
///
/// The taxonomy is flat: every failure the decoder, binder or interpreter can
/// produce maps to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidPushLength,
    ScriptSizeExceeded,
    StackUnderflow,
    NumericOverflow,
    UnbalancedIf,
    UnbalancedElse,
    UnbalancedEndif,
    VerifyFailed,
    DisabledOpcode,
    UnknownOpcode,
    MissingTransactionContext,
    MalformedTransaction,
    InputIndexOutOfRange,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error of a script execution step, carrying a message meant for the step log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExecError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExecError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> ExecError {
        ExecError {
            kind,
            message: message.into(),
        }
    }

    pub fn underflow(needed: usize, have: usize) -> ExecError {
        ExecError::new(
            ErrorKind::StackUnderflow,
            format!("needs {} stack item(s), found {}", needed, have),
        )
    }

    /// Prefixes the message with the operation that failed.
    pub fn in_op(self, op: impl fmt::Display) -> ExecError {
        ExecError {
            kind: self.kind,
            message: format!("{}: {}", op, self.message),
        }
    }
}
