use std::fmt;

use uuid::Uuid;

/// Id of one invocation: a single dependency call, or a single
/// [`Harness::start`](crate::Harness::start).
///
/// Appears in `tracing` events as `call_id` and in [`Harness::dump`](crate::Harness::dump),
/// so log lines for the same call can be tied together. Two starts of the
/// same target get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(Uuid);

impl CallId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_and_print_as_uuids() {
        let a = CallId::new();
        assert_ne!(a, CallId::new());
        assert_eq!(a.to_string().len(), 36);
    }
}
