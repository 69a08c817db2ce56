use std::fmt;

/// Abort the current task over a misconfigured harness or a protocol
/// violation. These are never reported as `Err`: the test itself is broken.
#[track_caller]
pub(crate) fn fatal(message: impl fmt::Display) -> ! {
    let message = message.to_string();
    tracing::error!("{message}");
    panic!("{message}");
}
