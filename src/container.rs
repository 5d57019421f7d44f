//! Named dependency container and its builder

use crate::{
    error::Error,
    options::{FailurePolicy, Options}
};
use std::{
    any::type_name,
    collections::{HashMap, hash_map::Entry},
    ops::Deref,
    sync::Arc
};

pub use self::provider::{AnyService, Factory, Provider, ProviderKind};

pub mod provider;

/// Inner HashMap of providers
type ProviderMap = HashMap<String, Provider>;

/// Named providers together with the options used to resolve them.
///
/// Both [`ContainerBuilder`] and [`Container`] dereference to a `Registry`,
/// so lookups read the same on either side of [`ContainerBuilder::build`].
#[derive(Debug, Default)]
pub struct Registry {
    providers: ProviderMap,
    options: Options
}

impl Registry {
    fn insert(&mut self, key: String, provider: Provider) -> Result<(), Error> {
        match self.providers.entry(key) {
            Entry::Occupied(entry) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key = entry.key().as_str(), "key already registered");
                Err(Error::DuplicateKey(entry.key().clone()))
            },
            Entry::Vacant(entry) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = entry.key().as_str(), kind = ?provider.kind(), "provider registered");
                entry.insert(provider);
                Ok(())
            }
        }
    }

    /// Resolves the value registered under `key` without a type check
    #[inline]
    pub fn get_any(&self, key: &str) -> Result<AnyService, Error> {
        self.providers
            .get(key)
            .ok_or_else(|| {
                #[cfg(feature = "tracing")]
                tracing::debug!(key, "key not found");
                Error::NotFound(key.into())
            })?
            .resolve(key, &self.options)
    }

    /// Resolves the value registered under `key` and returns a shared pointer
    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>, Error> {
        self.get_any(key)?
            .downcast::<T>()
            .map_err(|_| Error::TypeMismatch {
                key: key.into(),
                expected: type_name::<T>()
            })
    }

    /// Resolves the value registered under `key` and returns a clone of it.
    /// `T` must implement [`Clone`] otherwise use [`Registry::get`] method
    /// that returns a shared pointer.
    #[inline]
    pub fn get_cloned<T: Send + Sync + Clone + 'static>(&self, key: &str) -> Result<T, Error> {
        self.get::<T>(key).map(|value| value.as_ref().clone())
    }

    /// Returns `true` if something is registered under `key`.
    ///
    /// Never invokes a factory.
    #[inline]
    pub fn has_definition(&self, key: &str) -> bool {
        self.providers.contains_key(key)
    }

    /// Returns the registered provider without resolving it
    #[inline]
    pub fn provider(&self, key: &str) -> Option<&Provider> {
        self.providers.get(key)
    }

    /// Returns an iterator over the registered keys in arbitrary order
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Returns the number of registrations
    #[inline]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if nothing has been registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the options lookups resolve with
    #[inline]
    pub fn options(&self) -> Options {
        self.options
    }
}

/// Represents a container builder, the place where named providers are registered.
///
/// Keys are unique: registering a key twice fails with [`Error::DuplicateKey`]
/// and keeps the first registration. Values can already be resolved from the
/// builder through its [`Registry`], factories are invoked on first lookup
/// and their result is cached.
///
/// # Example
/// ```
/// use keyed_di::{ContainerBuilder, error::Error};
///
/// struct Foo;
/// struct Bar;
///
/// impl Bar {
///     fn new() -> Self { Self }
/// }
///
/// # fn main() -> Result<(), Error> {
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register_instance("foo", Foo)?
///     .register_factory("bar", Bar::new)?;
///
/// assert!(builder.has_definition("foo"));
///
/// let first = builder.get::<Bar>("bar")?;
/// let second = builder.get::<Bar>("bar")?;
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    registry: Registry
}

impl Deref for ContainerBuilder {
    type Target = Registry;

    #[inline]
    fn deref(&self) -> &Registry {
        &self.registry
    }
}

impl ContainerBuilder {
    /// Creates a new container builder with default [`Options`]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder and registers each `(key, provider)` pair in order
    ///
    /// Fails on the first duplicate key.
    pub fn try_from_iter<K, I>(providers: I) -> Result<Self, Error>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Provider)>
    {
        let mut builder = Self::new();
        for (key, provider) in providers {
            builder.register(key, provider)?;
        }
        Ok(builder)
    }

    /// Replaces the container [`Options`]
    pub fn with_options(mut self, options: Options) -> Self {
        self.registry.options = options;
        self
    }

    /// Configures what happens to a factory after a failed construction
    ///
    /// Default: [`FailurePolicy::Retry`]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.registry.options = self.registry.options.with_failure_policy(policy);
        self
    }

    /// Lets a panic inside a factory unwind into the caller of `get`
    ///
    /// Default: panics are reported as [`Error::ConstructionFailed`]
    pub fn without_panic_capture(mut self) -> Self {
        self.registry.options = self.registry.options.without_panic_capture();
        self
    }

    /// Build a container
    #[inline]
    pub fn build(self) -> Container {
        Container {
            registry: Arc::new(self.registry)
        }
    }

    /// Registers a provider under `key`
    ///
    /// Returns the builder on success so that calls can be chained.
    pub fn register(&mut self, key: impl Into<String>, provider: Provider) -> Result<&mut Self, Error> {
        self.registry.insert(key.into(), provider)?;
        Ok(self)
    }

    /// Registers a ready-made value
    #[inline]
    pub fn register_instance<T>(&mut self, key: impl Into<String>, instance: T) -> Result<&mut Self, Error>
    where
        T: Send + Sync + 'static
    {
        self.register(key, Provider::instance(instance))
    }

    /// Registers a value that the caller already shares through an [`Arc`]
    #[inline]
    pub fn register_shared<T>(&mut self, key: impl Into<String>, instance: Arc<T>) -> Result<&mut Self, Error>
    where
        T: Send + Sync + 'static
    {
        self.register(key, Provider::shared(instance))
    }

    /// Registers a zero-argument constructor invoked on first lookup
    #[inline]
    pub fn register_factory<T, F>(&mut self, key: impl Into<String>, factory: F) -> Result<&mut Self, Error>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static
    {
        self.register(key, Provider::factory(factory))
    }

    /// Registers a fallible zero-argument constructor invoked on first lookup
    #[inline]
    pub fn register_try_factory<T, E, F>(&mut self, key: impl Into<String>, factory: F) -> Result<&mut Self, Error>
    where
        T: Send + Sync + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static
    {
        self.register(key, Provider::try_factory(factory))
    }
}

/// Represents a frozen container that is cheap to clone and share between threads.
///
/// All clones see the same providers, a factory resolved through one clone
/// is resolved for all of them. Lookups are provided by [`Registry`].
#[derive(Debug, Clone)]
pub struct Container {
    /// Read-only providers
    registry: Arc<Registry>
}

impl Deref for Container {
    type Target = Registry;

    #[inline]
    fn deref(&self) -> &Registry {
        &self.registry
    }
}

/// A `container!` macro that builds a [`ContainerBuilder`] from `key => provider` pairs.
///
/// Expands to [`ContainerBuilder::try_from_iter`], so it evaluates to
/// `Result<ContainerBuilder, Error>` and fails on a duplicate key.
///
/// # Example
/// ```
/// use keyed_di::{container, Provider};
///
/// struct Foo;
/// struct Bar;
///
/// let builder = container! {
///     "foo" => Provider::instance(Foo),
///     "bar" => Provider::factory(|| Bar),
/// }.unwrap();
///
/// assert_eq!(builder.len(), 2);
///
/// let duplicated = container! {
///     "foo" => Provider::instance(Foo),
///     "foo" => Provider::instance(Foo),
/// };
///
/// assert!(duplicated.is_err());
/// ```
#[macro_export]
macro_rules! container {
    () => {
        ::std::result::Result::<_, $crate::error::Error>::Ok($crate::ContainerBuilder::new())
    };
    ($($key:expr => $provider:expr),+ $(,)?) => {
        $crate::ContainerBuilder::try_from_iter([
            $((::std::string::String::from($key), $provider)),+
        ])
    };
}
