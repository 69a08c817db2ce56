use std::{
    cell::Cell,
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::{FutureExt, future::BoxFuture};
use tokio::sync::watch;

use super::panic_value;
use crate::{CallId, CallableId, Outcome, Signature, Target, Value, Values, target::Body};

/// Launch `target` on its own task and return the receiving end of its
/// private completion slot.
///
/// The slot is written exactly once, by the spawned task, with either the
/// values the target returned or the payload of the panic that ended it.
pub(crate) fn spawn(
    target: &Target,
    args: Values,
    call_id: CallId,
) -> watch::Receiver<Option<Outcome>> {
    let (tx, rx) = watch::channel(None);
    let callable = target.id().clone();
    let signature = target.signature().clone();

    match target.body().clone() {
        Body::Async(body) => {
            tokio::spawn(async move {
                let result = AssertUnwindSafe(AsyncBody(body(args)))
                    .catch_unwind()
                    .await;
                complete(&tx, &callable, call_id, &signature, result);
            });
        }
        Body::Blocking(body) => {
            tokio::task::spawn_blocking(move || {
                let result = catch_unwind(AssertUnwindSafe(|| body(args)));
                complete(&tx, &callable, call_id, &signature, result);
            });
        }
    }

    rx
}

thread_local! {
    static POLLING_ASYNC_TARGET: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is polling the body of an async target.
pub(crate) fn in_async_target() -> bool {
    POLLING_ASYNC_TARGET.with(Cell::get)
}

/// Marks the worker thread for the duration of each poll of the body.
struct AsyncBody(BoxFuture<'static, Values>);

struct PollMark(bool);

impl PollMark {
    fn set() -> Self {
        PollMark(POLLING_ASYNC_TARGET.with(|flag| flag.replace(true)))
    }
}

impl Drop for PollMark {
    fn drop(&mut self) {
        POLLING_ASYNC_TARGET.with(|flag| flag.set(self.0));
    }
}

impl Future for AsyncBody {
    type Output = Values;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Values> {
        let _mark = PollMark::set();
        self.0.as_mut().poll(cx)
    }
}

fn complete(
    tx: &watch::Sender<Option<Outcome>>,
    callable: &CallableId,
    call_id: CallId,
    signature: &Signature,
    result: std::thread::Result<Values>,
) {
    let outcome = match result {
        Ok(values) => match signature.check_returns(callable, &values) {
            Ok(()) => Outcome::Returned(values),
            Err(e) => {
                tracing::error!(%callable, %call_id, "{e}");
                Outcome::Panicked(Value::new(e.to_string()))
            }
        },
        Err(payload) => Outcome::Panicked(panic_value(payload)),
    };
    tracing::debug!(%callable, %call_id, %outcome, "target finished");
    tx.send_replace(Some(outcome));
}
