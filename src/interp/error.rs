use serde::{Deserialize, Serialize};

/// Failures of the interpreter itself, as opposed to exceptions thrown by the
/// program and contract violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum RuntimeError {
    #[error("recursion depth limit ({limit}) exceeded in {member}")]
    RecursionLimitExceeded { member: String, limit: usize },

    #[error("unknown entry point `{entry}`")]
    UnknownEntry { entry: String },

    #[error("entry point `{entry}` must be a static method without parameters")]
    BadEntry { entry: String },

    #[error("`{member}` has no implementation for receiver class `{class}`")]
    NoImplementation { member: String, class: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RuntimeError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}
