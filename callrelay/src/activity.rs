use std::fmt;

use crate::{Call, Value, Values};

/// One observable event flowing from code under test to the test script.
///
/// Dependency calls travel over the harness relay as `Activity::Call`. The
/// terminal variants describe how a started target finished; they are
/// recorded on that target's [`CallHandle`](crate::CallHandle) and never
/// appear on the relay.
#[derive(Debug, Clone)]
pub enum Activity {
    Call(Call),
    Return(Values),
    Panic(Value),
}

impl Activity {
    /// Returns true for `Return` and `Panic`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Activity::Call(_))
    }
}

impl From<Call> for Activity {
    fn from(call: Call) -> Self {
        Activity::Call(call)
    }
}

impl From<Outcome> for Activity {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Returned(values) => Activity::Return(values),
            Outcome::Panicked(value) => Activity::Panic(value),
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Call(call) => write!(f, "call {call}"),
            Activity::Return(values) => write!(f, "return {values:?}"),
            Activity::Panic(value) => write!(f, "panic {value:?}"),
        }
    }
}

/// What the test posts into a pending call's response slot.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResponse {
    Return(Values),
    Panic(Value),
}

/// How a started target finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Returned(Values),
    Panicked(Value),
}

impl Outcome {
    pub fn is_return(&self) -> bool {
        matches!(self, Outcome::Returned(_))
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Outcome::Panicked(_))
    }

    pub fn returned(&self) -> Option<&Values> {
        match self {
            Outcome::Returned(values) => Some(values),
            Outcome::Panicked(_) => None,
        }
    }

    pub fn panicked(&self) -> Option<&Value> {
        match self {
            Outcome::Panicked(value) => Some(value),
            Outcome::Returned(_) => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Returned(values) => write!(f, "return {values:?}"),
            Outcome::Panicked(value) => write!(f, "panic {value:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntoValues;

    #[test]
    fn outcomes_convert_to_terminal_activities() {
        let activity = Activity::from(Outcome::Returned((5_i32,).into_values()));
        assert!(activity.is_terminal());
        assert_eq!(activity.to_string(), "return (5)");

        let activity = Activity::from(Outcome::Panicked(Value::new("boom")));
        assert!(activity.is_terminal());
        assert_eq!(activity.to_string(), r#"panic "boom""#);
    }
}
