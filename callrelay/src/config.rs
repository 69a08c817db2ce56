use std::time::Duration;

/// Timing configuration for a [`Harness`](crate::Harness).
///
/// Use the builder methods to customize, or [`Default`] for values that
/// suit most unit tests.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use callrelay::HarnessConfig;
///
/// let config = HarnessConfig::default()
///     .with_default_timeout(Duration::from_millis(200))   // Fail fast
///     .with_response_timeout(Duration::from_secs(30));    // Slow manual debugging
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HarnessConfig {
    /// How long an expectation waits when no `within` is given.
    /// Default: 1s
    default_timeout: Duration,

    /// How long a stand-in keeps its caller blocked waiting for the test to
    /// post a response before giving up.
    /// Default: 5s
    response_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            default_timeout: Duration::from_secs(1),
            response_timeout: Duration::from_secs(5),
        }
    }
}

impl HarnessConfig {
    /// Set the timeout used by expectations that don't call `within`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Returns the default expectation timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Set how long a stand-in waits for the test to respond.
    ///
    /// A stand-in that runs out of time panics inside the code under test,
    /// which then surfaces as the target's outcome.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Returns the stand-in response timeout.
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }
}
