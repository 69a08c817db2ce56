use std::{fmt, future::Future, sync::Arc};

use futures_util::{FutureExt, future::BoxFuture};

use crate::{
    CallableId, FromValues, IntoValues, Signature, TypeList, Values, internal::fatal,
};

type AsyncBody = Arc<dyn Fn(Values) -> BoxFuture<'static, Values> + Send + Sync>;
type BlockingBody = Arc<dyn Fn(Values) -> Values + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Body {
    Async(AsyncBody),
    Blocking(BlockingBody),
}

/// The unit of code under test.
///
/// A target is started through [`Harness::start`](crate::Harness::start),
/// which runs it on its own task. Async bodies run on the Tokio scheduler;
/// blocking bodies run on the blocking pool and may call
/// [`StandIn::call_blocking`](crate::StandIn::call_blocking).
///
/// ```rust
/// use callrelay::Target;
///
/// let double = Target::from_fn("double", |(n,): (u32,)| async move { (n * 2,) });
/// assert_eq!(double.signature().to_string(), "fn(u32) -> u32");
/// ```
#[derive(Clone)]
pub struct Target {
    id: CallableId,
    signature: Signature,
    body: Body,
}

impl Target {
    /// Async target over untyped values.
    pub fn new<F, Fut>(id: impl Into<CallableId>, signature: Signature, f: F) -> Self
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Values> + Send + 'static,
    {
        Self {
            id: id.into(),
            signature,
            body: Body::Async(Arc::new(move |args: Values| f(args).boxed())),
        }
    }

    /// Async target with typed parameters `P` and returns `R`.
    pub fn from_fn<P, R, F, Fut>(id: impl Into<CallableId>, f: F) -> Self
    where
        P: TypeList + FromValues + Send + 'static,
        R: TypeList + IntoValues + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let id = id.into();
        let name = id.clone();
        Self::new(id, Signature::of::<P, R>(), move |args: Values| {
            let params = typed_params::<P>(&name, &args);
            f(params).map(IntoValues::into_values)
        })
    }

    /// Blocking target over untyped values.
    pub fn blocking<F>(id: impl Into<CallableId>, signature: Signature, f: F) -> Self
    where
        F: Fn(Values) -> Values + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            signature,
            body: Body::Blocking(Arc::new(f)),
        }
    }

    /// Blocking target with typed parameters `P` and returns `R`.
    pub fn from_blocking_fn<P, R, F>(id: impl Into<CallableId>, f: F) -> Self
    where
        P: TypeList + FromValues + 'static,
        R: TypeList + IntoValues + 'static,
        F: Fn(P) -> R + Send + Sync + 'static,
    {
        let id = id.into();
        let name = id.clone();
        Self::blocking(id, Signature::of::<P, R>(), move |args: Values| {
            f(typed_params::<P>(&name, &args)).into_values()
        })
    }

    #[inline]
    pub fn id(&self) -> &CallableId {
        &self.id
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self.body, Body::Blocking(_))
    }

    pub(crate) fn body(&self) -> &Body {
        &self.body
    }
}

// Arguments are checked against the signature before the body runs.
fn typed_params<P: FromValues>(target: &CallableId, args: &Values) -> P {
    match P::from_values(args) {
        Ok(params) => params,
        Err(e) => fatal(format_args!("{target} received unusable arguments: {e}")),
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .field("blocking", &self.is_blocking())
            .finish()
    }
}
