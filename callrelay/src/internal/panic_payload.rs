use std::{any::Any, panic::resume_unwind, sync::Mutex};

use crate::{Opaque, Value};

/// Convert a payload caught at a task boundary into a [`Value`].
///
/// Payloads raised by a stand-in are already `Value`s. Messages from
/// `panic!` arrive as `&'static str` or `String` and both become `String`.
/// Anything else is kept as an opaque value.
pub(crate) fn panic_value(payload: Box<dyn Any + Send>) -> Value {
    let payload = match payload.downcast::<Value>() {
        Ok(value) => return normalize_message(*value),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<String>() {
        Ok(message) => return Value::new(*message),
        Err(payload) => payload,
    };
    match payload.downcast::<&'static str>() {
        Ok(message) => Value::new(String::from(*message)),
        Err(payload) => Value::new(Opaque::new(Mutex::new(payload))),
    }
}

/// A `&'static str` message becomes a `String`, so a payload compares the
/// same whether it came from `panic!`, `inject_panic` or a test assertion.
pub(crate) fn normalize_message(value: Value) -> Value {
    match value.downcast_ref::<&'static str>() {
        Some(message) => Value::new(String::from(*message)),
        None => value,
    }
}

/// Unwind the current task with `value` as the payload.
pub(crate) fn raise(value: Value) -> ! {
    resume_unwind(Box::new(value))
}
