//! Argument and outcome matching.

use std::{borrow::Cow, fmt, sync::Arc};

use crate::{TypeSpec, Value, ValueType, Values};

type MatchFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A matcher for one argument, return value, or panic payload.
///
/// `Matcher` can match values:
/// - Exactly, by structural equality ([`Matcher::eq`], [`Matcher::value`])
/// - By type only ([`Matcher::of_type`])
/// - By a custom predicate ([`Matcher::by`], [`Matcher::by_value`])
/// - Unconditionally ([`Matcher::any`]), for arguments that can't be
///   meaningfully compared
///
/// Each matcher carries a description that appears in failure diagnostics.
///
/// # Example
///
/// ```rust
/// use callrelay::{Matcher, Value};
///
/// let exact = Matcher::eq(String::from("42"));
/// assert!(exact.matches(&Value::new(String::from("42"))));
///
/// let short = Matcher::by("short id", |id: &String| id.len() < 4);
/// assert!(short.matches(&Value::new(String::from("42"))));
/// assert!(!short.matches(&Value::new(42_u32)));
///
/// assert!(Matcher::any().matches(&Value::new(())));
/// ```
#[derive(Clone)]
pub struct Matcher {
    predicate: MatchFn,
    description: Cow<'static, str>,
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Matcher").field(&self.description).finish()
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl Matcher {
    /// Match values structurally equal to `expected`.
    pub fn eq<T: ValueType>(expected: T) -> Self {
        Self::value(Value::new(expected))
    }

    /// Match values equal to an already erased `expected`.
    pub fn value(expected: Value) -> Self {
        Self {
            description: Cow::Owned(format!("{expected:?}")),
            predicate: Arc::new(move |actual: &Value| *actual == expected),
        }
    }

    /// Match anything.
    pub fn any() -> Self {
        Self {
            description: Cow::Borrowed("any value"),
            predicate: Arc::new(|_: &Value| true),
        }
    }

    /// Match any value of type `T`.
    pub fn of_type<T: ValueType>() -> Self {
        Self {
            description: Cow::Owned(format!("any {}", TypeSpec::of::<T>().short_name())),
            predicate: Arc::new(|actual: &Value| actual.is::<T>()),
        }
    }

    /// Match values of type `T` satisfying `predicate`. Values of other types
    /// never match.
    pub fn by<T, F>(description: impl Into<Cow<'static, str>>, predicate: F) -> Self
    where
        T: ValueType,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(move |actual: &Value| {
                actual.downcast_ref::<T>().is_some_and(|v| predicate(v))
            }),
        }
    }

    /// Match using a predicate over the erased value.
    pub fn by_value<F>(description: impl Into<Cow<'static, str>>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Returns true if `value` satisfies this matcher.
    pub fn matches(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// One exact matcher per value.
    pub fn exact(values: &Values) -> Vec<Matcher> {
        values.iter().cloned().map(Matcher::value).collect()
    }
}

/// Where a list of matchers first disagrees with a list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mismatch {
    Arity {
        expected: usize,
        actual: usize,
    },
    Value {
        position: usize,
        expected: String,
        actual: String,
    },
}

pub(crate) fn first_mismatch(matchers: &[Matcher], values: &Values) -> Option<Mismatch> {
    if matchers.len() != values.len() {
        return Some(Mismatch::Arity {
            expected: matchers.len(),
            actual: values.len(),
        });
    }
    matchers
        .iter()
        .zip(values)
        .enumerate()
        .find(|(_, (matcher, value))| !matcher.matches(value))
        .map(|(position, (matcher, value))| Mismatch::Value {
            position,
            expected: matcher.to_string(),
            actual: format!("{value:?}"),
        })
}

pub(crate) fn describe_all(matchers: &[Matcher]) -> String {
    let parts: Vec<String> = matchers.iter().map(Matcher::to_string).collect();
    format!("({})", parts.join(", "))
}
