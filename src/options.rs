//! Resolution options of a container

/// Describes what happens to a factory provider after its factory fails
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Nothing is cached, the next lookup invokes the factory again
    #[default]
    Retry,

    /// The first failure is cached and returned by every later lookup
    /// of the key, the factory is never invoked again
    Poison
}

/// Represents container options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Specifies what happens to a factory provider after a failed construction
    ///
    /// Default: [`FailurePolicy::Retry`]
    pub(crate) failure_policy: FailurePolicy,

    /// Specifies whether a panic inside a factory is caught
    /// and reported as [`Error::ConstructionFailed`](crate::error::Error::ConstructionFailed)
    ///
    /// Default: `true`
    pub(crate) capture_panics: bool
}

impl Default for Options {
    #[inline]
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Retry,
            capture_panics: true
        }
    }
}

impl Options {
    /// Creates default options
    ///
    /// Defaults:
    /// - failure_policy: [`FailurePolicy::Retry`]
    /// - capture_panics: `true`
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the [`FailurePolicy`]
    ///
    /// Default: [`FailurePolicy::Retry`]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Lets a panic inside a factory unwind into the caller
    ///
    /// Default: panics are captured
    pub fn without_panic_capture(mut self) -> Self {
        self.capture_panics = false;
        self
    }

    /// Returns the configured [`FailurePolicy`]
    #[inline]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Returns `true` if factory panics are captured
    #[inline]
    pub fn captures_panics(&self) -> bool {
        self.capture_panics
    }
}
