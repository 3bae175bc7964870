use lasso::Spur;

use crate::value::{resolve, Env, Value};

/// A SON evaluation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SonError {
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    #[error("{receiver} does not understand #{selector}")]
    MessageNotUnderstood { receiver: String, selector: String },

    #[error("argument error: {0}")]
    Argument(String),

    #[error("{0}")]
    Eval(String),
}

impl SonError {
    pub fn eval(msg: impl Into<String>) -> Self {
        SonError::Eval(msg.into())
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        SonError::Argument(msg.into())
    }

    pub fn not_understood(receiver: &Value, selector: Spur) -> Self {
        SonError::MessageNotUnderstood {
            receiver: receiver.print_string(),
            selector: resolve(selector),
        }
    }
}

/// Why an evaluation stopped before producing a value.
///
/// `LocalReturn` and `NonLocalReturn` are control signals, not errors:
/// they ride the `Err` track so that `?` propagates them through every
/// intervening frame, and only the matching method activation pattern
/// matches them back into a value. Everything else converts them at the
/// top of an evaluation into a plain error.
#[derive(Debug, Clone)]
pub enum Unwind {
    Error(SonError),
    LocalReturn(Value),
    NonLocalReturn { value: Value, home: Env },
}

impl From<SonError> for Unwind {
    fn from(e: SonError) -> Self {
        Unwind::Error(e)
    }
}

impl Unwind {
    /// Collapse at the top of an evaluation: an uncaught return signal
    /// becomes an error.
    pub fn into_error(self) -> SonError {
        match self {
            Unwind::Error(e) => e,
            Unwind::LocalReturn(_) | Unwind::NonLocalReturn { .. } => {
                SonError::eval("return escaped its method activation")
            }
        }
    }
}

pub type EvalResult = Result<Value, Unwind>;
