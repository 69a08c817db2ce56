use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::oneshot;

use crate::{
    CallId, CallResponse, CallableId, Error, FromValues, IntoValues, Result, Signature, Value,
    ValueType, Values, internal::fatal,
};

struct CallInner {
    id: CallId,
    target: CallableId,
    signature: Signature,
    args: Values,
    slot: Mutex<Option<oneshot::Sender<CallResponse>>>,
}

/// A pending invocation of a mimicked dependency.
///
/// Obtained from [`Harness::expect_call`](crate::Harness::expect_call). The
/// caller inside the code under test stays blocked until the test answers
/// with [`inject_return`](Self::inject_return) or
/// [`inject_panic`](Self::inject_panic).
///
/// Each call has exactly one response slot. `Call` is cheap to clone and all
/// clones share that slot, so answering the same call twice, through any
/// clone, panics with "response already posted".
///
/// ```ignore
/// let call = test.expect_call("Store.get").with_args((String::from("42"),)).await?;
/// let (id,): (String,) = call.args()?;
/// call.inject_return((format!("item {id}"), None::<String>))?;
/// ```
#[derive(Clone)]
pub struct Call {
    inner: Arc<CallInner>,
}

impl Call {
    pub(crate) fn new(
        target: CallableId,
        signature: Signature,
        args: Values,
    ) -> (Self, oneshot::Receiver<CallResponse>) {
        let (tx, rx) = oneshot::channel();
        let call = Self {
            inner: Arc::new(CallInner {
                id: CallId::new(),
                target,
                signature,
                args,
                slot: Mutex::new(Some(tx)),
            }),
        };
        (call, rx)
    }

    #[inline]
    pub fn id(&self) -> CallId {
        self.inner.id
    }

    /// Identity of the dependency that was called.
    #[inline]
    pub fn target(&self) -> &CallableId {
        &self.inner.target
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// The arguments exactly as the code under test passed them.
    #[inline]
    pub fn raw_args(&self) -> &Values {
        &self.inner.args
    }

    /// Typed view of all arguments, e.g. `call.args::<(String, u32)>()`.
    pub fn args<T: FromValues>(&self) -> Result<T> {
        self.inner.args.typed()
    }

    /// Clone out the argument at `position`.
    pub fn arg<T: ValueType + Clone>(&self, position: usize) -> Result<T> {
        self.inner.args.arg(position)
    }

    /// Whether a response has already been posted.
    pub fn is_resolved(&self) -> bool {
        self.lock_slot().is_none()
    }

    /// Unblock the caller with `values` as the dependency's return values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongReturnCount`] or [`Error::WrongReturnType`] if
    /// `values` doesn't fit the dependency's signature; nothing is posted in
    /// that case. Returns [`Error::CallerGone`] if the caller stopped waiting.
    ///
    /// # Panics
    ///
    /// Panics if a response was already posted to this call.
    pub fn inject_return(&self, values: impl IntoValues) -> Result<()> {
        let values = values.into_values();
        self.inner
            .signature
            .check_returns(&self.inner.target, &values)?;
        self.respond(CallResponse::Return(values))
    }

    /// Make the caller panic with `value`.
    ///
    /// # Panics
    ///
    /// Panics if a response was already posted to this call.
    pub fn inject_panic<V: ValueType>(&self, value: V) -> Result<()> {
        self.inject_panic_value(Value::new(value))
    }

    /// Like [`inject_panic`](Self::inject_panic) for an already erased value.
    pub fn inject_panic_value(&self, value: Value) -> Result<()> {
        self.respond(CallResponse::Panic(value))
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<CallResponse>>> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, response: CallResponse) -> Result<()> {
        let slot = self.lock_slot().take();
        let Some(slot) = slot else {
            fatal(format_args!("response already posted to {self}"));
        };
        if slot.send(response).is_err() {
            tracing::warn!(
                call_id = %self.id(),
                callable = %self.target(),
                "caller stopped waiting before the response"
            );
            return Err(Error::CallerGone(self.to_string()));
        }
        tracing::debug!(call_id = %self.id(), callable = %self.target(), "response posted");
        Ok(())
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.inner.target, self.inner.args)
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.inner.id)
            .field("target", &self.inner.target)
            .field("args", &self.inner.args)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
