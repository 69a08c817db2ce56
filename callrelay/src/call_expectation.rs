use std::{fmt, future::IntoFuture, pin::Pin, time::Duration};

use tokio::time::Instant;

use crate::{
    Call, CallableId, Error, Harness, IntoValues, Matcher, Result, StandIn,
    matcher::{Mismatch, describe_all, first_mismatch},
};

/// Which dependency a call expectation is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Any mimicked dependency.
    Any,
    /// The dependency with this identity.
    Exact(CallableId),
}

impl CallTarget {
    fn accepts(&self, id: &CallableId) -> bool {
        match self {
            CallTarget::Any => true,
            CallTarget::Exact(expected) => expected == id,
        }
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallTarget::Any => f.write_str("any dependency"),
            CallTarget::Exact(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for CallTarget {
    fn from(id: &str) -> Self {
        CallTarget::Exact(CallableId::new(id))
    }
}

impl From<String> for CallTarget {
    fn from(id: String) -> Self {
        CallTarget::Exact(CallableId::from(id))
    }
}

impl From<CallableId> for CallTarget {
    fn from(id: CallableId) -> Self {
        CallTarget::Exact(id)
    }
}

impl From<&CallableId> for CallTarget {
    fn from(id: &CallableId) -> Self {
        CallTarget::Exact(id.clone())
    }
}

impl From<&StandIn> for CallTarget {
    fn from(stand_in: &StandIn) -> Self {
        CallTarget::Exact(stand_in.id().clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchMode {
    /// The very next call must match.
    Ordered,
    /// Some call, now or before the deadline, must match.
    Eventually,
}

/// An awaited assertion that the code under test calls a dependency.
///
/// Created by [`Harness::expect_call`] (ordered) or
/// [`Eventually::expect_call`]. Resolves to the matched [`Call`], which the
/// test then answers.
///
/// # Example
///
/// ```ignore
/// let call = test
///     .expect_call("Store.get")
///     .with_args((String::from("42"),))
///     .within(Duration::from_millis(200))
///     .await?;
/// ```
pub struct CallExpectation<'a> {
    harness: &'a mut Harness,
    target: CallTarget,
    matchers: Option<Vec<Matcher>>,
    mode: MatchMode,
    timeout: Duration,
}

impl<'a> CallExpectation<'a> {
    pub(crate) fn new(harness: &'a mut Harness, target: CallTarget, mode: MatchMode) -> Self {
        let timeout = harness.config().default_timeout();
        Self {
            harness,
            target,
            matchers: None,
            mode,
            timeout,
        }
    }

    /// Require arguments structurally equal to `args`.
    pub fn with_args(self, args: impl IntoValues) -> Self {
        let args = args.into_values();
        self.matching(Matcher::exact(&args))
    }

    /// Require arguments satisfying `matchers`, one per argument.
    pub fn matching(mut self, matchers: Vec<Matcher>) -> Self {
        self.matchers = Some(matchers);
        self
    }

    /// Override the harness default timeout.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn expected(&self) -> String {
        match &self.matchers {
            Some(matchers) => format!("{}{}", self.target, describe_all(matchers)),
            None => format!("{}(..)", self.target),
        }
    }

    fn satisfied_by(&self, call: &Call) -> bool {
        satisfies(&self.target, self.matchers.as_deref(), call)
    }

    fn timed_out(&self) -> Error {
        let awaited = format!("call to {}", self.expected());
        tracing::warn!(mode = ?self.mode, "timed out waiting for {awaited}");
        Error::Timeout {
            awaited,
            within: self.timeout,
        }
    }

    async fn run(mut self) -> Result<Call> {
        if let CallTarget::Exact(id) = &self.target {
            self.harness.validate_expectation(id, self.matchers.as_deref());
        }
        let deadline = deadline_after(self.timeout);
        let call = match self.mode {
            MatchMode::Ordered => self.next_in_order(deadline).await?,
            MatchMode::Eventually => self.first_satisfying(deadline).await?,
        };
        tracing::debug!(
            call_id = %call.id(),
            callable = %call.target(),
            mode = ?self.mode,
            "call matched"
        );
        Ok(call)
    }

    async fn next_in_order(&mut self, deadline: Instant) -> Result<Call> {
        let Some(call) = self.harness.next_call(deadline).await else {
            return Err(self.timed_out());
        };

        if !self.target.accepts(call.target()) {
            let err = Error::WrongCall {
                expected: self.expected(),
                actual: call.to_string(),
            };
            self.harness.put_back(call);
            return Err(err);
        }

        let mismatch = self
            .matchers
            .as_deref()
            .and_then(|m| first_mismatch(m, call.raw_args()));
        let Some(mismatch) = mismatch else {
            return Ok(call);
        };
        let err = match mismatch {
            Mismatch::Value {
                position,
                expected,
                actual,
            } => Error::WrongValues {
                call: call.to_string(),
                position,
                expected,
                actual,
            },
            Mismatch::Arity { expected, actual } => Error::WrongValues {
                call: call.to_string(),
                position: expected.min(actual),
                expected: format!("{expected} arguments"),
                actual: format!("{actual} arguments"),
            },
        };
        self.harness.put_back(call);
        Err(err)
    }

    async fn first_satisfying(&mut self, deadline: Instant) -> Result<Call> {
        self.harness.drain_ready();
        let (target, matchers) = (&self.target, self.matchers.as_deref());
        if let Some(call) = self
            .harness
            .claim_pending(|call| satisfies(target, matchers, call))
        {
            return Ok(call);
        }
        loop {
            let Some(call) = self.harness.receive(deadline).await else {
                return Err(self.timed_out());
            };
            if self.satisfied_by(&call) {
                return Ok(call);
            }
            tracing::debug!(call = %call, "buffering call while waiting for {}", self.expected());
            self.harness.buffer(call);
        }
    }
}

/// `now + within`, clamped for bounds too long to represent.
fn deadline_after(within: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(within)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

fn satisfies(target: &CallTarget, matchers: Option<&[Matcher]>, call: &Call) -> bool {
    target.accepts(call.target())
        && matchers.is_none_or(|m| first_mismatch(m, call.raw_args()).is_none())
}

impl<'a> IntoFuture for CallExpectation<'a> {
    type Output = Result<Call>;
    type IntoFuture = Pin<Box<dyn std::future::Future<Output = Self::Output> + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

impl fmt::Debug for CallExpectation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallExpectation")
            .field("target", &self.target)
            .field("matchers", &self.matchers)
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Order-insensitive matching, created by [`Harness::eventually`].
#[derive(Debug)]
pub struct Eventually<'a> {
    pub(crate) harness: &'a mut Harness,
}

impl<'a> Eventually<'a> {
    /// Wait until some call to `target` arrives, or has already arrived,
    /// regardless of calls in between.
    ///
    /// Calls that don't match stay pending for later expectations.
    pub fn expect_call(self, target: impl Into<CallTarget>) -> CallExpectation<'a> {
        CallExpectation::new(self.harness, target.into(), MatchMode::Eventually)
    }
}

/// An awaited assertion that the code under test stays quiet.
///
/// Created by [`Harness::expect_no_calls`].
pub struct QuietExpectation<'a> {
    harness: &'a mut Harness,
    window: Duration,
}

impl<'a> QuietExpectation<'a> {
    pub(crate) fn new(harness: &'a mut Harness) -> Self {
        let window = harness.config().default_timeout();
        Self { harness, window }
    }

    /// How long to watch for calls. Defaults to the harness default timeout.
    pub fn within(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    async fn run(self) -> Result<()> {
        self.harness.drain_ready();
        if let Some(call) = self.harness.oldest_pending() {
            return Err(Error::UnexpectedCall(call.to_string()));
        }
        let deadline = deadline_after(self.window);
        match self.harness.receive(deadline).await {
            None => Ok(()),
            Some(call) => {
                let description = call.to_string();
                self.harness.buffer(call);
                Err(Error::UnexpectedCall(description))
            }
        }
    }
}

impl<'a> IntoFuture for QuietExpectation<'a> {
    type Output = Result<()>;
    type IntoFuture = Pin<Box<dyn std::future::Future<Output = Self::Output> + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

impl fmt::Debug for QuietExpectation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuietExpectation")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
