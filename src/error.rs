//! Describes registry errors

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter},
    io::Error as IoError
};

/// Error raised while registering or resolving a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The key is already registered. The existing provider is left untouched.
    DuplicateKey(String),

    /// Nothing is registered under the key
    NotFound(String),

    /// A factory returned an error or panicked while building the value
    ConstructionFailed {
        /// Key of the failed factory
        key: String,
        /// Error message or panic payload of the factory
        reason: String
    },

    /// The stored value is not of the requested type
    TypeMismatch {
        /// Key that was looked up
        key: String,
        /// Name of the requested type
        expected: &'static str
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateKey(key) => write!(f, "Registry Error: key already registered: {key}"),
            Error::NotFound(key) => write!(f, "Registry Error: key not found: {key}"),
            Error::ConstructionFailed { key, reason } => write!(f, "Registry Error: unable to construct {key}: {reason}"),
            Error::TypeMismatch { key, expected } => write!(f, "Registry Error: {key} is not of type {expected}")
        }
    }
}

impl StdError for Error {}

impl From<Error> for IoError {
    #[inline]
    fn from(err: Error) -> Self {
        Self::other(err)
    }
}

impl Error {
    /// Returns the key this error refers to
    #[inline]
    pub fn key(&self) -> &str {
        match self {
            Error::DuplicateKey(key)
            | Error::NotFound(key)
            | Error::ConstructionFailed { key, .. }
            | Error::TypeMismatch { key, .. } => key
        }
    }

    #[inline]
    pub(crate) fn construction_failed(key: &str, reason: impl Display) -> Self {
        Error::ConstructionFailed {
            key: key.into(),
            reason: reason.to_string()
        }
    }
}
