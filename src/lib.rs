//! # keyed-di
//!
//! > A tiny inversion-of-control registry: register named dependencies, either as
//! > ready-made instances or as zero-argument constructors, and resolve them later by name.
//!
//! ## Features
//! * Instance providers are returned as is, the same [`Arc`](std::sync::Arc) on every lookup
//! * Factory providers are invoked lazily, once, and their result is memoized
//! * Duplicate registrations are rejected, the first one always wins
//! * A frozen [`Container`] can be cloned and shared between threads
//! * Optional [`tracing`](https://docs.rs/tracing) events behind the `tracing` feature
//!
//! ## Example
//! ```toml
//! [dependencies]
//! keyed-di = "0.1.0"
//! ```
//! ```
//! use keyed_di::{ContainerBuilder, error::Error};
//!
//! #[derive(Debug)]
//! struct Config { url: &'static str }
//!
//! struct Client { url: &'static str }
//!
//! impl Client {
//!     fn new() -> Self {
//!         Self { url: "postgres://localhost" }
//!     }
//! }
//!
//! # fn main() -> Result<(), Error> {
//! let mut builder = ContainerBuilder::new();
//! builder
//!     .register_instance("config", Config { url: "postgres://localhost" })?
//!     .register_factory("client", Client::new)?;
//!
//! let container = builder.build();
//!
//! // the factory is invoked here, later lookups reuse its result
//! let client = container.get::<Client>("client")?;
//! let config = container.get::<Config>("config")?;
//!
//! assert_eq!(client.url, config.url);
//! assert!(container.get::<Client>("cache").is_err());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

pub use crate::{
    container::{AnyService, Container, ContainerBuilder, Factory, Provider, ProviderKind, Registry},
    options::{FailurePolicy, Options},
};

pub mod container;
pub mod error;
pub mod options;
