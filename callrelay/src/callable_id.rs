use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

static NEXT_ANONYMOUS: AtomicU64 = AtomicU64::new(1);

/// Name of a dependency, a dependency method, or a target.
///
/// Closures and trait objects can't be compared, so nothing in callrelay
/// ever compares callables. Instead each one is named when it is described,
/// and matching, registry lookups and diagnostics all go through the name.
/// Two stand-ins with the same name are the same dependency as far as the
/// harness is concerned, which is why [`Harness::mimic`](crate::Harness::mimic)
/// rejects duplicates.
///
/// Anonymous ids (`dependency#7`) come from a process-wide counter. They
/// serialize like any other name but mean nothing outside the process that
/// generated them.
///
/// ```rust
/// use callrelay::CallableId;
///
/// let get = CallableId::method("Store", "get");
/// assert_eq!(get, CallableId::new("Store.get"));
/// assert_eq!(get.owner(), Some("Store"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallableId(Arc<str>);

impl CallableId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// `Owner.method`, for a method reached through an interface.
    pub fn method(owner: &str, method: &str) -> Self {
        Self(Arc::from(format!("{owner}.{method}")))
    }

    /// `{prefix}#{n}`, unique within the process.
    pub fn anonymous(prefix: &str) -> Self {
        let n = NEXT_ANONYMOUS.fetch_add(1, Ordering::Relaxed);
        Self(Arc::from(format!("{prefix}#{n}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the last `.`, if this names a method.
    pub fn owner(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(owner, _)| owner)
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallableId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CallableId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}
