use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
    Call, CallResponse, CallableId, Dependency, FromValues, IntoValues, Signature, Values,
    internal::{Relay, fatal, raise, runner},
};

/// A controllable substitute for a dependency, handed to the code under test.
///
/// Created by [`Harness::mimic`](crate::Harness::mimic). Each invocation
/// publishes a [`Call`] on the harness relay and blocks the caller until
/// the test answers it. A response of `Return` hands the values back; a
/// response of `Panic` unwinds the caller with the injected value.
///
/// `StandIn` is cheap to clone and can be moved into the code under test.
///
/// # Panics
///
/// Invocations panic inside the caller when:
/// - the arguments don't fit the dependency's signature
/// - the harness was dropped, or no response arrived within
///   [`HarnessConfig::response_timeout`](crate::HarnessConfig::response_timeout)
#[derive(Clone)]
pub struct StandIn {
    id: CallableId,
    signature: Signature,
    relay: Relay,
    response_timeout: Duration,
    shutdown: CancellationToken,
}

impl StandIn {
    pub(crate) fn new(
        dependency: Dependency,
        relay: Relay,
        response_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id: dependency.id().clone(),
            signature: dependency.signature().clone(),
            relay,
            response_timeout,
            shutdown,
        }
    }

    #[inline]
    pub fn id(&self) -> &CallableId {
        &self.id
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Call the dependency with untyped arguments.
    pub async fn call(&self, args: impl IntoValues) -> Values {
        let rx = self.publish(args.into_values());
        let description = self.id.to_string();

        let response = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                fatal(format_args!("harness shut down before responding to {description}"))
            }
            response = tokio::time::timeout(self.response_timeout, rx) => response,
        };

        match response {
            Ok(Ok(response)) => self.unpack(response),
            Ok(Err(_)) => fatal(format_args!("response slot of {description} was dropped")),
            Err(_) => fatal(format_args!(
                "no response to {description} within {:?}",
                self.response_timeout
            )),
        }
    }

    /// Call the dependency and convert the returned values to `R`.
    ///
    /// ```ignore
    /// let (item, err): (String, Option<String>) = store_get.invoke((id,)).await;
    /// ```
    pub async fn invoke<R: FromValues>(&self, args: impl IntoValues) -> R {
        let values = self.call(args).await;
        self.typed(values)
    }

    /// Like [`call`](Self::call) for code under test running on a blocking
    /// thread, such as a target built with [`Target::blocking`](crate::Target::blocking).
    ///
    /// # Panics
    ///
    /// Panics when called:
    /// - outside a Tokio runtime context
    /// - from async code, including the body of an async [`Target`](crate::Target);
    ///   use [`call`](Self::call) there
    ///
    /// On a `current_thread` runtime the response timeout only advances while
    /// the runtime's own thread is inside `block_on`, as it is in
    /// `#[tokio::test]`.
    pub fn call_blocking(&self, args: impl IntoValues) -> Values {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => fatal(format_args!(
                "{}: call_blocking used outside a Tokio runtime: {e}",
                self.id
            )),
        };
        if runner::in_async_target() {
            fatal(format_args!(
                "{}: call_blocking used from async code on a {:?} runtime, await call() instead",
                self.id,
                handle.runtime_flavor()
            ));
        }
        handle.block_on(self.call(args))
    }

    /// Blocking counterpart of [`invoke`](Self::invoke).
    pub fn invoke_blocking<R: FromValues>(&self, args: impl IntoValues) -> R {
        let values = self.call_blocking(args);
        self.typed(values)
    }

    fn publish(&self, args: Values) -> oneshot::Receiver<CallResponse> {
        if let Err(e) = self.signature.check_args(&self.id, &args) {
            fatal(e);
        }
        let (call, rx) = Call::new(self.id.clone(), self.signature.clone(), args);
        self.relay.publish(call);
        rx
    }

    fn unpack(&self, response: CallResponse) -> Values {
        match response {
            CallResponse::Return(values) => {
                // Injection already checked the shape; a mismatch here means
                // the slot was fed from elsewhere.
                if let Err(e) = self.signature.check_returns(&self.id, &values) {
                    fatal(e);
                }
                values
            }
            CallResponse::Panic(value) => {
                tracing::debug!(callable = %self.id, payload = ?value, "raising injected panic");
                raise(value)
            }
        }
    }

    fn typed<R: FromValues>(&self, values: Values) -> R {
        match R::from_values(&values) {
            Ok(typed) => typed,
            Err(e) => fatal(format_args!("{} returned unexpected values: {e}", self.id)),
        }
    }
}

impl std::fmt::Debug for StandIn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandIn")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
