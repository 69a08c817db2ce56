use std::{fmt, future::IntoFuture, pin::Pin, time::Duration};

use tokio::sync::watch;

use crate::{
    CallId, CallableId, Error, IntoValues, Matcher, Outcome, Result, Signature, Value, ValueType,
    internal::{fatal, normalize_message},
    matcher::{describe_all, first_mismatch},
};

/// The test's view of one started target.
///
/// Returned by [`Harness::start`](crate::Harness::start). Each handle owns
/// a private completion slot that the target's task writes exactly once,
/// so handles for concurrently running targets never see each other's
/// outcomes.
#[derive(Clone)]
pub struct CallHandle {
    id: CallId,
    target: CallableId,
    signature: Signature,
    completion: watch::Receiver<Option<Outcome>>,
    default_timeout: Duration,
}

enum Expected {
    Any,
    Returns(Vec<Matcher>),
    Panics(Matcher),
}

impl CallHandle {
    pub(crate) fn new(
        id: CallId,
        target: CallableId,
        signature: Signature,
        completion: watch::Receiver<Option<Outcome>>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            id,
            target,
            signature,
            completion,
            default_timeout,
        }
    }

    #[inline]
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Identity of the started target.
    #[inline]
    pub fn target(&self) -> &CallableId {
        &self.target
    }

    /// The outcome, if the target has finished.
    pub fn try_outcome(&self) -> Option<Outcome> {
        self.completion.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.completion.borrow().is_some()
    }

    /// Wait for the target to finish, whichever way it finishes.
    pub fn wait_for_response(&self) -> OutcomeExpectation<'_> {
        OutcomeExpectation::new(self, Ok(Expected::Any))
    }

    /// Wait for the target to return exactly `values`.
    ///
    /// The expected values are checked against the target's return types
    /// before waiting; a shape mismatch fails immediately with
    /// [`Error::WrongReturnCount`] or [`Error::WrongReturnType`].
    ///
    /// ```ignore
    /// handle.expect_return((5_i32, String::from("five"))).await?;
    /// ```
    pub fn expect_return(&self, values: impl IntoValues) -> OutcomeExpectation<'_> {
        let values = values.into_values();
        let expected = self
            .signature
            .check_returns(&self.target, &values)
            .map(|()| Expected::Returns(Matcher::exact(&values)));
        OutcomeExpectation::new(self, expected)
    }

    /// Wait for the target to return values satisfying `matchers`, one per
    /// return value.
    pub fn expect_return_matches(&self, matchers: Vec<Matcher>) -> OutcomeExpectation<'_> {
        let expected = if matchers.len() == self.signature.returns().len() {
            Ok(Expected::Returns(matchers))
        } else {
            Err(Error::WrongReturnCount {
                target: self.target.clone(),
                expected: self.signature.returns().len(),
                actual: matchers.len(),
            })
        };
        OutcomeExpectation::new(self, expected)
    }

    /// Wait for the target to panic with a payload equal to `value`.
    ///
    /// Messages from `panic!("...")` are captured as `String`; a `&str`
    /// passed here is compared as a `String` too.
    pub fn expect_panic_equals<V: ValueType>(&self, value: V) -> OutcomeExpectation<'_> {
        self.expect_panic_matches(Matcher::value(normalize_message(Value::new(value))))
    }

    /// Wait for the target to panic with a payload satisfying `matcher`.
    pub fn expect_panic_matches(&self, matcher: Matcher) -> OutcomeExpectation<'_> {
        OutcomeExpectation::new(self, Ok(Expected::Panics(matcher)))
    }

    async fn finish(&self, within: Duration) -> Result<Outcome> {
        let mut completion = self.completion.clone();
        let waited = tokio::time::timeout(within, completion.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(slot)) => match &*slot {
                Some(outcome) => Ok(outcome.clone()),
                None => unreachable!("wait_for returned an unfinished slot"),
            },
            Ok(Err(_)) => fatal(format_args!(
                "{} ended without recording an outcome",
                self.target
            )),
            Err(_) => {
                let awaited = format!("{} to finish", self.target);
                tracing::warn!(call_id = %self.id, "timed out waiting for {awaited}");
                Err(Error::Timeout { awaited, within })
            }
        }
    }

    fn verify(&self, expected: &Expected, outcome: &Outcome) -> Result<()> {
        match (expected, outcome) {
            (Expected::Any, _) => Ok(()),
            (Expected::Returns(matchers), Outcome::Returned(values)) => {
                if first_mismatch(matchers, values).is_none() {
                    Ok(())
                } else {
                    Err(Error::ReturnMismatch {
                        target: self.target.clone(),
                        expected: describe_all(matchers),
                        actual: format!("{values:?}"),
                    })
                }
            }
            (Expected::Panics(matcher), Outcome::Panicked(value)) => {
                if matcher.matches(value) {
                    Ok(())
                } else {
                    Err(Error::PanicMismatch {
                        target: self.target.clone(),
                        expected: matcher.to_string(),
                        actual: format!("{value:?}"),
                    })
                }
            }
            (Expected::Returns(matchers), Outcome::Panicked(_)) => Err(Error::WrongOutcome {
                target: self.target.clone(),
                expected: format!("return {}", describe_all(matchers)),
                actual: outcome.to_string(),
            }),
            (Expected::Panics(matcher), Outcome::Returned(_)) => Err(Error::WrongOutcome {
                target: self.target.clone(),
                expected: format!("panic {matcher}"),
                actual: outcome.to_string(),
            }),
        }
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("outcome", &self.try_outcome())
            .finish()
    }
}

/// An awaited assertion about how a target finishes.
///
/// Created by the `expect_*` and `wait_for_response` methods of
/// [`CallHandle`]. Resolves to the target's [`Outcome`] when it satisfies
/// the expectation.
pub struct OutcomeExpectation<'a> {
    handle: &'a CallHandle,
    expected: Result<Expected>,
    timeout: Duration,
}

impl<'a> OutcomeExpectation<'a> {
    fn new(handle: &'a CallHandle, expected: Result<Expected>) -> Self {
        Self {
            handle,
            expected,
            timeout: handle.default_timeout,
        }
    }

    /// Override the harness default timeout.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(self) -> Result<Outcome> {
        let expected = self.expected?;
        let outcome = self.handle.finish(self.timeout).await?;
        tracing::debug!(callable = %self.handle.target, %outcome, "target outcome observed");
        self.handle.verify(&expected, &outcome)?;
        Ok(outcome)
    }
}

impl<'a> IntoFuture for OutcomeExpectation<'a> {
    type Output = Result<Outcome>;
    type IntoFuture = Pin<Box<dyn std::future::Future<Output = Self::Output> + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

impl fmt::Debug for OutcomeExpectation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeExpectation")
            .field("handle", &self.handle)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
