#![forbid(unsafe_code)]

//! Per-type encode/decode strategies.
//!
//! A [`Codec<T>`] maps a logical value to a [`RawValue`] and back. Encoding
//! may fail only for structured values; decoding returns `None` for anything
//! that does not fit, and the binding treats `None` exactly like a missing
//! entry.
//!
//! [`Storable`] is the default-codec registry: every type with an obvious
//! store representation names its codec there, so
//! [`StoredBinding::new`](crate::StoredBinding::new) needs no codec argument.
//! Enums and structs opt in with one line:
//!
//! ```
//! use ftui_prefs::codec::{IntTagCodec, IntTagged, Storable};
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum Density { Compact = 0, Comfortable = 1 }
//!
//! impl IntTagged for Density {
//!     fn tag(&self) -> i64 { *self as i64 }
//!     fn from_tag(tag: i64) -> Option<Self> {
//!         match tag {
//!             0 => Some(Self::Compact),
//!             1 => Some(Self::Comfortable),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl Storable for Density {
//!     type Codec = IntTagCodec<Self>;
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::EncodeError;
use crate::value::{RawValue, Url};

/// Encode/decode pair between `T` and the store representation.
pub trait Codec<T> {
    /// Convert `value` for storage.
    fn encode(&self, value: &T) -> Result<RawValue, EncodeError>;

    /// Convert a stored entry back. `None` means "does not decode as `T`".
    fn decode(&self, raw: &RawValue) -> Option<T>;
}

/// Types with a default codec.
pub trait Storable: Sized {
    type Codec: Codec<Self> + Default + 'static;

    #[must_use]
    fn codec() -> Self::Codec {
        Self::Codec::default()
    }
}

// ---------------------------------------------------------------------------
// Native primitives
// ---------------------------------------------------------------------------

/// Identity codec for types the store holds natively.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCodec;

macro_rules! native_codec {
    ($ty:ty, |$enc:ident| $encode:expr, |$raw:ident| $decode:expr) => {
        impl Codec<$ty> for NativeCodec {
            fn encode(&self, $enc: &$ty) -> Result<RawValue, EncodeError> {
                Ok($encode)
            }

            fn decode(&self, $raw: &RawValue) -> Option<$ty> {
                $decode
            }
        }

        impl Storable for $ty {
            type Codec = NativeCodec;
        }
    };
}

native_codec!(bool, |v| RawValue::Bool(*v), |raw| raw.as_bool());
native_codec!(i64, |v| RawValue::Int(*v), |raw| raw.as_int());
native_codec!(i32, |v| RawValue::Int(i64::from(*v)), |raw| raw
    .as_int()
    .and_then(|i| i32::try_from(i).ok()));
native_codec!(u32, |v| RawValue::Int(i64::from(*v)), |raw| raw
    .as_int()
    .and_then(|i| u32::try_from(i).ok()));
native_codec!(f64, |v| RawValue::Float(*v), |raw| raw.as_float());
native_codec!(f32, |v| RawValue::Float(f64::from(*v)), |raw| raw
    .as_float()
    .map(|f| f as f32));
native_codec!(String, |v| RawValue::String(v.clone()), |raw| raw
    .as_str()
    .map(str::to_owned));
native_codec!(Vec<u8>, |v| RawValue::Data(v.clone()), |raw| raw
    .as_bytes()
    .map(<[u8]>::to_vec));

// ---------------------------------------------------------------------------
// Url
// ---------------------------------------------------------------------------

/// Stores a [`Url`] as its string form; unparsable strings decode to `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlCodec;

impl Codec<Url> for UrlCodec {
    fn encode(&self, value: &Url) -> Result<RawValue, EncodeError> {
        Ok(RawValue::String(value.as_str().to_owned()))
    }

    fn decode(&self, raw: &RawValue) -> Option<Url> {
        raw.as_str().and_then(|s| Url::parse(s).ok())
    }
}

impl Storable for Url {
    type Codec = UrlCodec;
}

// ---------------------------------------------------------------------------
// Tagged enums
// ---------------------------------------------------------------------------

/// Enum-like types backed by an integer tag.
pub trait IntTagged: Sized {
    fn tag(&self) -> i64;

    /// `None` for tags with no variant.
    fn from_tag(tag: i64) -> Option<Self>;
}

/// Enum-like types backed by a string tag.
pub trait StrTagged: Sized {
    fn tag(&self) -> &str;

    /// `None` for tags with no variant.
    fn from_tag(tag: &str) -> Option<Self>;
}

/// Stores an [`IntTagged`] value as `RawValue::Int`.
pub struct IntTagCodec<T>(PhantomData<fn() -> T>);

/// Stores a [`StrTagged`] value as `RawValue::String`.
pub struct StrTagCodec<T>(PhantomData<fn() -> T>);

impl<T> IntTagCodec<T> {
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> StrTagCodec<T> {
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for IntTagCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Default for StrTagCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IntTagCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntTagCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T> fmt::Debug for StrTagCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrTagCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: IntTagged> Codec<T> for IntTagCodec<T> {
    fn encode(&self, value: &T) -> Result<RawValue, EncodeError> {
        Ok(RawValue::Int(value.tag()))
    }

    fn decode(&self, raw: &RawValue) -> Option<T> {
        raw.as_int().and_then(T::from_tag)
    }
}

impl<T: StrTagged> Codec<T> for StrTagCodec<T> {
    fn encode(&self, value: &T) -> Result<RawValue, EncodeError> {
        Ok(RawValue::String(value.tag().to_owned()))
    }

    fn decode(&self, raw: &RawValue) -> Option<T> {
        raw.as_str().and_then(T::from_tag)
    }
}

// ---------------------------------------------------------------------------
// Structured values
// ---------------------------------------------------------------------------

/// Serializes any serde type to JSON bytes stored as `RawValue::Data`.
///
/// Decoding fails closed: malformed JSON, a shape mismatch, or a non-`Data`
/// entry all yield `None`.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec<T> {
    fn encode(&self, value: &T) -> Result<RawValue, EncodeError> {
        serde_json::to_vec(value)
            .map(RawValue::Data)
            .map_err(|err| EncodeError::new::<T>(err.to_string()))
    }

    fn decode(&self, raw: &RawValue) -> Option<T> {
        serde_json::from_slice(raw.as_bytes()?).ok()
    }
}

// ---------------------------------------------------------------------------
// Caller-supplied functions
// ---------------------------------------------------------------------------

/// A codec built from a pair of closures.
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D> {
    #[must_use]
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<E, D> fmt::Debug for FnCodec<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

impl<T, E, D> Codec<T> for FnCodec<E, D>
where
    E: Fn(&T) -> Result<RawValue, EncodeError>,
    D: Fn(&RawValue) -> Option<T>,
{
    fn encode(&self, value: &T) -> Result<RawValue, EncodeError> {
        (self.encode)(value)
    }

    fn decode(&self, raw: &RawValue) -> Option<T> {
        (self.decode)(raw)
    }
}
