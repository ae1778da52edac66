#![forbid(unsafe_code)]

//! Error kinds for stored bindings and their stores.
//!
//! Decode failures are deliberately absent: a stored entry that cannot be
//! decoded is recovered in place (default value, rewrite, diagnostic) and is
//! never reported to the caller.

use std::fmt;
use std::io;

/// A value could not be converted into its store representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    type_name: &'static str,
    message: String,
}

impl EncodeError {
    /// Create an encode error for values of type `T`.
    #[must_use]
    pub fn new<T: ?Sized>(message: impl Into<String>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            message: message.into(),
        }
    }

    /// Name of the type that failed to encode.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Underlying serializer message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot encode {}: {}", self.type_name, self.message)
    }
}

impl std::error::Error for EncodeError {}

/// Failures reported by a [`Store`](crate::store::Store).
#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing the backing medium failed.
    Io(io::Error),
    /// The backing medium holds data the store cannot parse.
    Format(String),
    /// The store refused the operation.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "store I/O error: {err}"),
            Self::Format(msg) => write!(f, "malformed store contents: {msg}"),
            Self::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Format(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Errors from creating or writing a [`StoredBinding`](crate::StoredBinding).
#[derive(Debug)]
pub enum BindingError {
    /// The value for `key` could not be encoded. Nothing was written.
    Encode { key: String, source: EncodeError },
    /// The store rejected the write for `key`. The cached value is unchanged.
    Store { key: String, source: StoreError },
}

impl BindingError {
    /// Key of the binding that failed.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Encode { key, .. } | Self::Store { key, .. } => key,
        }
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { key, source } => write!(f, "binding '{key}': {source}"),
            Self::Store { key, source } => write!(f, "binding '{key}': {source}"),
        }
    }
}

impl std::error::Error for BindingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode { source, .. } => Some(source),
            Self::Store { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn encode_error_names_type() {
        let err = EncodeError::new::<Vec<u8>>("boom");
        assert!(err.type_name().contains("Vec"));
        assert_eq!(err.message(), "boom");
        assert!(err.to_string().starts_with("cannot encode"));
    }

    #[test]
    fn binding_error_exposes_key_and_source() {
        let err = BindingError::Store {
            key: "theme".into(),
            source: StoreError::Unavailable("read-only".into()),
        };
        assert_eq!(err.key(), "theme");
        assert!(err.to_string().contains("theme"));
        assert!(err.source().is_some());
    }

    #[test]
    fn io_error_converts() {
        let err: StoreError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(err.source().is_some());
    }
}
