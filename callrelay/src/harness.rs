use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
};

use tokio::{
    sync::mpsc::{UnboundedReceiver, error::TryRecvError, unbounded_channel},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    Activity, Call, CallExpectation, CallHandle, CallId, CallTarget, CallableId, Dependency,
    Error, Eventually, HarnessConfig, IntoValues, Matcher, QuietExpectation, Result, Signature,
    StandIn, Target,
    call_expectation::MatchMode,
    internal::{Relay, fatal, runner},
};

/// Coordinates one test: hands out stand-ins, starts targets, and matches
/// the calls the code under test makes against the test's expectations.
///
/// The harness provides:
/// - Dependency stand-ins via [`mimic`](Self::mimic)
/// - Target execution via [`start`](Self::start)
/// - Ordered matching via [`expect_call`](Self::expect_call)
/// - Order-insensitive matching via [`eventually`](Self::eventually)
///
/// Calls are claimed at most once. A call that didn't satisfy an
/// expectation stays pending, in arrival order, for the next one.
///
/// # Example
///
/// ```ignore
/// let mut test = Harness::default();
/// let get = test.mimic(Dependency::method::<(String,), (String, Option<String>)>("Store", "get"))?;
///
/// let handle = test.start(&fetch_target(get), (String::from("42"),));
///
/// test.expect_call("Store.get")
///     .with_args((String::from("42"),))
///     .await?
///     .inject_return((String::from("hello"), None::<String>))?;
///
/// handle.expect_return((String::from("hello"), None::<String>)).await?;
/// ```
///
/// Dropping the harness unblocks every stand-in still waiting for a
/// response; they panic inside the code under test.
pub struct Harness {
    config: HarnessConfig,
    relay: Relay,
    receiver: UnboundedReceiver<Activity>,
    pending: VecDeque<Call>,
    registry: BTreeMap<CallableId, Signature>,
    shutdown: CancellationToken,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            config,
            relay: Relay::from(tx),
            receiver: rx,
            pending: VecDeque::new(),
            registry: BTreeMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Create a stand-in for `dependency`, bound to this harness.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDependency`] if a dependency with the same
    /// identity was already mimicked.
    pub fn mimic(&mut self, dependency: Dependency) -> Result<StandIn> {
        if self.registry.contains_key(dependency.id()) {
            return Err(Error::DuplicateDependency(dependency.id().clone()));
        }
        self.registry
            .insert(dependency.id().clone(), dependency.signature().clone());
        tracing::debug!(
            callable = %dependency.id(),
            signature = %dependency.signature(),
            "dependency mimicked"
        );
        Ok(StandIn::new(
            dependency,
            self.relay.clone(),
            self.config.response_timeout(),
            self.shutdown.clone(),
        ))
    }

    /// Run `target` with `args` on its own task.
    ///
    /// Returns immediately. The handle observes how the target finishes.
    ///
    /// # Panics
    ///
    /// Panics if `args` don't fit the target's signature.
    pub fn start(&self, target: &Target, args: impl IntoValues) -> CallHandle {
        let args = args.into_values();
        if let Err(e) = target.signature().check_args(target.id(), &args) {
            fatal(e);
        }
        let call_id = CallId::new();
        tracing::debug!(
            %call_id,
            callable = %target.id(),
            ?args,
            blocking = target.is_blocking(),
            "target started"
        );
        let completion = runner::spawn(target, args, call_id);
        CallHandle::new(
            call_id,
            target.id().clone(),
            target.signature().clone(),
            completion,
            self.config.default_timeout(),
        )
    }

    /// Expect the next call made by the code under test to be a call to
    /// `target`.
    ///
    /// Accepts a name (`&str`, `String`, [`CallableId`]), a `&`[`StandIn`],
    /// or [`CallTarget::Any`]. A different call arriving first fails with
    /// [`Error::WrongCall`] and stays pending.
    ///
    /// # Panics
    ///
    /// Panics when awaited if `target` names a dependency this harness never
    /// mimicked, or if argument matchers don't fit its parameter count.
    pub fn expect_call(&mut self, target: impl Into<CallTarget>) -> CallExpectation<'_> {
        CallExpectation::new(self, target.into(), MatchMode::Ordered)
    }

    /// Switch to order-insensitive matching for the next expectation.
    ///
    /// ```ignore
    /// test.eventually().expect_call("Log.write").within(Duration::from_secs(2)).await?;
    /// ```
    pub fn eventually(&mut self) -> Eventually<'_> {
        Eventually { harness: self }
    }

    /// Expect that no unclaimed call is pending and none arrives within the
    /// window.
    pub fn expect_no_calls(&mut self) -> QuietExpectation<'_> {
        QuietExpectation::new(self)
    }

    /// Number of calls that arrived but were not claimed by any expectation.
    pub fn pending_calls(&mut self) -> usize {
        self.drain_ready();
        self.pending.len()
    }

    /// Print the mimicked dependencies and the unclaimed calls.
    ///
    /// Useful when debugging a failing test.
    pub fn dump(&mut self) {
        self.drain_ready();
        println!("Mimicked dependencies ({}):", self.registry.len());
        for (id, signature) in &self.registry {
            println!("  {id}: {signature}");
        }
        if self.pending.is_empty() {
            println!("(no pending calls)");
            return;
        }
        println!("Pending calls ({}):", self.pending.len());
        for (i, call) in self.pending.iter().enumerate() {
            println!("  {i}: {call}  (id: {})", call.id());
        }
    }

    pub(crate) fn validate_expectation(&self, id: &CallableId, matchers: Option<&[Matcher]>) {
        let Some(signature) = self.registry.get(id) else {
            fatal(format_args!(
                "expected a call to {id}, which was never mimicked on this harness"
            ));
        };
        let Some(matchers) = matchers else {
            return;
        };
        if matchers.len() != signature.params().len() {
            fatal(format_args!(
                "{} argument matchers given for {id}, which takes {} ({signature})",
                matchers.len(),
                signature.params().len()
            ));
        }
    }

    /// Move everything already sitting on the relay into the pending buffer.
    pub(crate) fn drain_ready(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(activity) => {
                    let call = self.accept(activity);
                    self.pending.push_back(call);
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => fatal("relay closed while the harness was in use"),
            }
        }
    }

    /// The oldest unclaimed call, waiting on the relay until `deadline` if
    /// none is buffered.
    pub(crate) async fn next_call(&mut self, deadline: Instant) -> Option<Call> {
        match self.pending.pop_front() {
            Some(call) => Some(call),
            None => self.receive(deadline).await,
        }
    }

    /// Wait for the next call to arrive on the relay.
    pub(crate) async fn receive(&mut self, deadline: Instant) -> Option<Call> {
        match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
            Ok(Some(activity)) => Some(self.accept(activity)),
            Ok(None) => fatal("relay closed while the harness was in use"),
            Err(_) => None,
        }
    }

    /// Return a call that failed an ordered expectation to the head of the
    /// queue.
    pub(crate) fn put_back(&mut self, call: Call) {
        self.pending.push_front(call);
    }

    pub(crate) fn buffer(&mut self, call: Call) {
        self.pending.push_back(call);
    }

    pub(crate) fn oldest_pending(&self) -> Option<&Call> {
        self.pending.front()
    }

    /// Remove and return the oldest buffered call satisfying `predicate`.
    pub(crate) fn claim_pending(&mut self, predicate: impl Fn(&Call) -> bool) -> Option<Call> {
        let position = self.pending.iter().position(predicate)?;
        self.pending.remove(position)
    }

    fn accept(&self, activity: Activity) -> Call {
        match activity {
            Activity::Call(call) => {
                tracing::debug!(call_id = %call.id(), call = %call, "call received");
                call
            }
            other => fatal(format_args!("terminal activity on the relay: {other}")),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("dependencies", &self.registry.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn quick() -> Harness {
        Harness::new(HarnessConfig::default().with_default_timeout(Duration::from_millis(100)))
    }

    fn echo(stand_in: StandIn) -> Target {
        Target::from_fn("echo", move |(s,): (String,)| {
            let stand_in = stand_in.clone();
            async move { stand_in.invoke::<(String,)>((s,)).await }
        })
    }

    #[tokio::test]
    async fn mimicking_twice_is_an_error() {
        let mut test = quick();
        test.mimic(Dependency::of::<(), ()>("Clock.now")).unwrap();
        let err = test
            .mimic(Dependency::of::<(), ()>("Clock.now"))
            .unwrap_err();
        assert_eq!(err, Error::DuplicateDependency(CallableId::new("Clock.now")));
    }

    #[tokio::test]
    async fn ordered_call_round_trip() {
        let mut test = quick();
        let dep = test
            .mimic(Dependency::of::<(String,), (String,)>("Upper"))
            .unwrap();
        let handle = test.start(&echo(dep.clone()), (String::from("hi"),));

        let call = test
            .expect_call(&dep)
            .with_args((String::from("hi"),))
            .await
            .unwrap();
        call.inject_return((String::from("HI"),)).unwrap();

        handle.expect_return((String::from("HI"),)).await.unwrap();
        assert_eq!(test.pending_calls(), 0);
    }

    #[tokio::test]
    async fn wrong_call_stays_pending() {
        let mut test = quick();
        let a = test.mimic(Dependency::of::<(), ()>("A")).unwrap();
        test.mimic(Dependency::of::<(), ()>("B")).unwrap();
        let _handle = test.start(
            &Target::from_fn("calls_a", move |(): ()| {
                let a = a.clone();
                async move { a.invoke::<()>(()).await }
            }),
            (),
        );

        let err = test.expect_call("B").await.unwrap_err();
        assert!(matches!(&err, Error::WrongCall { actual, .. } if actual.starts_with('A')));

        let call = test.expect_call("A").await.unwrap();
        call.inject_return(()).unwrap();
    }

    #[tokio::test]
    async fn quiet_harness_passes_expect_no_calls() {
        let mut test = quick();
        test.expect_no_calls()
            .within(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(test.pending_calls(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "never mimicked")]
    async fn expecting_unknown_dependency_is_fatal() {
        let mut test = quick();
        let _ = test.expect_call("Nope").await;
    }

    #[tokio::test]
    #[should_panic(expected = "argument matchers given for Pair")]
    async fn matcher_count_must_fit_signature() {
        let mut test = quick();
        test.mimic(Dependency::of::<(u8, u8), ()>("Pair")).unwrap();
        let _ = test
            .expect_call("Pair")
            .matching(vec![Matcher::any()])
            .await;
    }

    #[tokio::test]
    #[should_panic(expected = "wrong number of arguments to echo")]
    async fn start_rejects_bad_arity() {
        let mut test = quick();
        let dep = test
            .mimic(Dependency::of::<(String,), (String,)>("Upper"))
            .unwrap();
        test.start(&echo(dep), ());
    }
}
