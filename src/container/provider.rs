//! Providers that produce the values stored in a container

use crate::{
    error::Error,
    options::{FailurePolicy, Options}
};
use std::{
    any::Any,
    error::Error as StdError,
    fmt::{Debug, Formatter},
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, OnceLock, PoisonError}
};

/// A type-erased shared value resolved from a container
pub type AnyService = Arc<
    dyn Any
    + Send
    + Sync
>;

type BoxError = Box<
    dyn StdError
    + Send
    + Sync
>;

type PanicPayload = Box<
    dyn Any
    + Send
>;

type FactoryFn = Box<
    dyn Fn() -> Result<AnyService, BoxError>
    + Send
    + Sync
>;

/// Describes how a [`Provider`] produces its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// A ready-made value
    Instance,
    /// A zero-argument function invoked on first lookup
    Factory
}

/// Represents a single registration.
///
/// The kind is chosen by the constructor used to build a provider:
/// [`Provider::instance`] and [`Provider::shared`] store a ready-made value,
/// [`Provider::factory`] and [`Provider::try_factory`] store a function
/// that is invoked lazily and whose first successful result is cached.
///
/// # Example
/// ```
/// use keyed_di::{Provider, ProviderKind};
///
/// struct Bar;
///
/// let instance = Provider::instance(String::from("foo"));
/// let factory = Provider::factory(|| Bar);
///
/// assert_eq!(instance.kind(), ProviderKind::Instance);
/// assert_eq!(factory.kind(), ProviderKind::Factory);
/// assert!(!factory.is_resolved());
/// ```
pub enum Provider {
    /// A ready-made value, returned as is on every lookup
    Instance(AnyService),
    /// A constructor function with its cached result
    Factory(Factory)
}

impl Debug for Provider {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Instance(_) => f.write_str("Provider::Instance(..)"),
            Provider::Factory(factory) => factory.fmt(f)
        }
    }
}

impl Provider {
    /// Creates an instance provider that owns `instance`
    #[inline]
    pub fn instance<T: Send + Sync + 'static>(instance: T) -> Self {
        Self::Instance(Arc::new(instance))
    }

    /// Creates an instance provider from an already shared value.
    ///
    /// Lookups return clones of this very [`Arc`], so [`Arc::ptr_eq`]
    /// holds between the caller's handle and every resolved one.
    #[inline]
    pub fn shared<T: Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self::Instance(instance)
    }

    /// Creates a factory provider from an infallible constructor
    #[inline]
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static
    {
        Self::Factory(Factory::new(move || Ok(Arc::new(factory()) as AnyService)))
    }

    /// Creates a factory provider from a fallible constructor.
    ///
    /// An `Err` returned by `factory` is reported as
    /// [`Error::ConstructionFailed`] and is never cached unless the
    /// container uses [`FailurePolicy::Poison`].
    #[inline]
    pub fn try_factory<T, E, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static
    {
        Self::Factory(Factory::new(move || factory()
            .map(|value| Arc::new(value) as AnyService)
            .map_err(Into::into)))
    }

    /// Returns the kind of this provider
    #[inline]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Instance(_) => ProviderKind::Instance,
            Provider::Factory(_) => ProviderKind::Factory
        }
    }

    /// Returns `true` if a lookup would not invoke anything
    #[inline]
    pub fn is_resolved(&self) -> bool {
        match self {
            Provider::Instance(_) => true,
            Provider::Factory(factory) => factory.is_resolved()
        }
    }

    #[inline]
    pub(crate) fn resolve(&self, key: &str, options: &Options) -> Result<AnyService, Error> {
        match self {
            Provider::Instance(instance) => Ok(instance.clone()),
            Provider::Factory(factory) => factory.resolve(key, options)
        }
    }
}

/// A zero-argument constructor with its memoized result
pub struct Factory {
    factory: FactoryFn,
    value: OnceLock<AnyService>,
    /// Serializes the first construction and holds a poisoned failure
    failure: Mutex<Option<Error>>
}

impl Debug for Factory {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider::Factory")
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}

impl Factory {
    #[inline]
    fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<AnyService, BoxError> + Send + Sync + 'static
    {
        Self {
            factory: Box::new(factory),
            value: OnceLock::new(),
            failure: Mutex::new(None)
        }
    }

    /// Returns `true` once the factory has produced its value
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// Returns `true` if a failure has been cached under [`FailurePolicy::Poison`]
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn resolve(&self, key: &str, options: &Options) -> Result<AnyService, Error> {
        if let Some(value) = self.value.get() {
            #[cfg(feature = "tracing")]
            tracing::trace!(key, "returning memoized value");
            return Ok(value.clone());
        }

        let mut failure = self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // another caller may have finished while we were waiting
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        if let Some(err) = failure.as_ref() {
            #[cfg(feature = "tracing")]
            tracing::warn!(key, "factory is poisoned by an earlier failure");
            return Err(err.clone());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(key, "invoking factory");

        let (err, payload) = match self.invoke(key) {
            Ok(value) => return Ok(self.value.get_or_init(|| value).clone()),
            Err(failed) => failed
        };

        #[cfg(feature = "tracing")]
        tracing::error!(key, "{err}");
        if options.failure_policy() == FailurePolicy::Poison {
            *failure = Some(err.clone());
        }

        // the failure is recorded before an uncaptured panic continues unwinding
        match payload {
            Some(payload) if !options.captures_panics() => {
                drop(failure);
                panic::resume_unwind(payload)
            },
            _ => Err(err)
        }
    }

    /// Invokes the factory, a panic is returned as an error along with its payload
    #[inline]
    fn invoke(&self, key: &str) -> Result<AnyService, (Error, Option<PanicPayload>)> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.factory)())) {
            Ok(result) => result.map_err(|err| (Error::construction_failed(key, err), None)),
            Err(payload) => {
                let err = Error::construction_failed(key, panic_message(payload.as_ref()));
                Err((err, Some(payload)))
            }
        }
    }
}

#[inline]
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "factory panicked"
    }
}

#[cfg(test)]
mod tests {
    use super::{Provider, ProviderKind};
    use crate::{error::Error, options::{FailurePolicy, Options}};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering}
    };

    #[derive(Debug)]
    struct Bar;

    fn counting_factory(calls: Arc<AtomicUsize>) -> Provider {
        Provider::factory(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Bar
        })
    }

    #[test]
    fn it_returns_same_instance() {
        let provider = Provider::instance(String::from("foo"));
        let options = Options::default();

        let first = provider.resolve("foo", &options).unwrap();
        let second = provider.resolve("foo", &options).unwrap();

        assert_eq!(provider.kind(), ProviderKind::Instance);
        assert!(provider.is_resolved());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn it_keeps_identity_of_shared_instance() {
        let shared = Arc::new(Bar);
        let provider = Provider::shared(shared.clone());

        let resolved = provider
            .resolve("bar", &Options::default())
            .unwrap()
            .downcast::<Bar>()
            .unwrap();

        assert!(Arc::ptr_eq(&shared, &resolved));
    }

    #[test]
    fn it_invokes_factory_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = counting_factory(calls.clone());
        let options = Options::default();

        assert!(!provider.is_resolved());

        let first = provider.resolve("bar", &options).unwrap();
        let second = provider.resolve("bar", &options).unwrap();
        let third = provider.resolve("bar", &options).unwrap();

        assert!(provider.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[test]
    fn it_retries_failed_factory_by_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = Provider::try_factory(move || {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err("not ready"),
                _ => Ok(Bar)
            }
        });
        let options = Options::default();

        let err = provider.resolve("bar", &options).unwrap_err();
        assert_eq!(err, Error::ConstructionFailed { key: "bar".into(), reason: "not ready".into() });
        assert!(!provider.is_resolved());

        assert!(provider.resolve("bar", &options).is_ok());
        assert!(provider.resolve("bar", &options).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn it_poisons_failed_factory() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = Provider::try_factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<Bar, _>("broken")
        });
        let options = Options::new().with_failure_policy(FailurePolicy::Poison);

        let first = provider.resolve("bar", &options).unwrap_err();
        let second = provider.resolve("bar", &options).unwrap_err();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let Provider::Factory(factory) = &provider else { unreachable!() };
        assert!(factory.is_poisoned());
        assert!(!factory.is_resolved());
    }

    #[test]
    fn it_captures_factory_panic() {
        let provider = Provider::factory(|| -> Bar { panic!("boom") });

        let err = provider.resolve("bar", &Options::default()).unwrap_err();

        assert_eq!(err, Error::ConstructionFailed { key: "bar".into(), reason: "boom".into() });
        assert!(!provider.is_resolved());
    }

    #[test]
    fn it_captures_formatted_panic_message() {
        let provider = Provider::factory(|| -> Bar { panic!("failed after {} attempts", 3) });

        let err = provider.resolve("bar", &Options::default()).unwrap_err();

        assert_eq!(err.to_string(), "Registry Error: unable to construct bar: failed after 3 attempts");
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn it_propagates_panic_without_capture() {
        let provider = Provider::factory(|| -> Bar { panic!("boom") });
        let options = Options::new().without_panic_capture();

        let _ = provider.resolve("bar", &options);
    }

    #[test]
    fn it_recovers_after_uncaptured_panic() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = Arc::new(Provider::factory(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first call fails");
            }
            Bar
        }));
        let options = Options::new().without_panic_capture();

        let first = {
            let provider = provider.clone();
            std::thread::spawn(move || provider.resolve("bar", &options).map(|_| ())).join()
        };
        assert!(first.is_err());

        assert!(provider.resolve("bar", &options).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn it_poisons_uncaptured_panic() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = Arc::new(Provider::factory(move || -> Bar {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("driver missing")
        }));
        let options = Options::new()
            .with_failure_policy(FailurePolicy::Poison)
            .without_panic_capture();

        let first = {
            let provider = provider.clone();
            std::thread::spawn(move || provider.resolve("db", &options).map(|_| ())).join()
        };
        assert!(first.is_err());

        for _ in 0..3 {
            let provider = provider.clone();
            let next = std::thread::spawn(move || provider.resolve("db", &options).map(|_| ()))
                .join()
                .unwrap();
            assert_eq!(next, Err(Error::ConstructionFailed { key: "db".into(), reason: "driver missing".into() }));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let Provider::Factory(factory) = provider.as_ref() else { unreachable!() };
        assert!(factory.is_poisoned());
    }

    #[test]
    fn it_formats_debug() {
        let instance = Provider::instance(1_u8);
        let factory = Provider::factory(|| Bar);

        assert_eq!(format!("{instance:?}"), "Provider::Instance(..)");
        assert_eq!(format!("{factory:?}"), "Provider::Factory { resolved: false, .. }");
    }
}
