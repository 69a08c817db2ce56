use std::time::Duration;

use crate::CallableId;

/// The single error type for all callrelay assertions.
///
/// Every awaited expectation returns `callrelay::Result<T>`. Variants are
/// assertion mismatches and timeouts: they fail the enclosing test but leave
/// the harness consistent, so later assertions in the same test still work.
///
/// Misconfiguration (bad arity handed to [`Harness::start`](crate::Harness::start)
/// or a stand-in) and protocol violations (a second response to the same
/// call) are not reported here. They panic in the offending task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("wrong number of arguments to {target}: expected {expected}, got {actual}")]
    WrongArgCount {
        target: CallableId,
        expected: usize,
        actual: usize,
    },

    #[error("wrong argument type for {target} at position {position}: expected {expected}, got {actual}")]
    WrongArgType {
        target: CallableId,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("wrong number of returns from {target}: expected {expected}, got {actual}")]
    WrongReturnCount {
        target: CallableId,
        expected: usize,
        actual: usize,
    },

    #[error("wrong return type from {target} at position {position}: expected {expected}, got {actual}")]
    WrongReturnType {
        target: CallableId,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("wrong number of values: expected {expected}, got {actual}")]
    WrongValueCount { expected: usize, actual: usize },

    #[error("wrong value type at position {position}: expected {expected}, got {actual}")]
    WrongValueType {
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("wrong call: expected {expected}, got {actual}")]
    WrongCall { expected: String, actual: String },

    #[error("wrong values in {call}: argument {position} expected {expected}, got {actual}")]
    WrongValues {
        call: String,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("wrong return values from {target}: expected {expected}, got {actual}")]
    ReturnMismatch {
        target: CallableId,
        expected: String,
        actual: String,
    },

    #[error("wrong panic value from {target}: expected {expected}, got {actual}")]
    PanicMismatch {
        target: CallableId,
        expected: String,
        actual: String,
    },

    #[error("wrong outcome from {target}: expected {expected}, got {actual}")]
    WrongOutcome {
        target: CallableId,
        expected: String,
        actual: String,
    },

    #[error("timed out after {within:?} waiting for {awaited}")]
    Timeout { awaited: String, within: Duration },

    #[error("unexpected call: {0}")]
    UnexpectedCall(String),

    #[error("dependency '{0}' is already mimicked")]
    DuplicateDependency(CallableId),

    #[error("caller of {0} stopped waiting before the response was posted")]
    CallerGone(String),
}

impl Error {
    /// Returns true for [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
