use thiserror::Error;

use crate::listing::Position;

/// A fatal error in the compilation unit. No assembly is produced for a unit
/// that reports one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("malformed IR in '{function}' at instruction {index}: {reason}")]
    MalformedIr {
        function: String,
        index: Position,
        reason: String,
    },
    #[error("unsupported construct in '{function}' at instruction {index}: {construct}")]
    UnsupportedConstruct {
        function: String,
        index: Position,
        construct: String,
    },
}
impl CompileError {
    pub fn malformed<S: Into<String>, R: Into<String>>(
        function: S,
        index: Position,
        reason: R,
    ) -> Self {
        Self::MalformedIr {
            function: function.into(),
            index,
            reason: reason.into(),
        }
    }

    pub fn unsupported<S: Into<String>, C: Into<String>>(
        function: S,
        index: Position,
        construct: C,
    ) -> Self {
        Self::UnsupportedConstruct {
            function: function.into(),
            index,
            construct: construct.into(),
        }
    }

    /// The function in which the error was found.
    pub fn function(&self) -> &str {
        match self {
            Self::MalformedIr { function, .. } => function,
            Self::UnsupportedConstruct { function, .. } => function,
        }
    }

    /// The index of the offending instruction within its function.
    pub fn position(&self) -> Position {
        match self {
            Self::MalformedIr { index, .. } => *index,
            Self::UnsupportedConstruct { index, .. } => *index,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
