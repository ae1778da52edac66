#![forbid(unsafe_code)]

//! Store-native value representation.
//!
//! A preferences database stores a small closed set of primitives. Every
//! logical value type is mapped onto one of them by its
//! [`Codec`](crate::codec::Codec).
//!
//! | Variant  | Typical source types                 |
//! |----------|--------------------------------------|
//! | `Bool`   | `bool`                               |
//! | `Int`    | `i64`, `i32`, `u32`, integer-tagged enums |
//! | `Float`  | `f64`, `f32`                         |
//! | `String` | `String`, [`Url`], string-tagged enums |
//! | `Data`   | `Vec<u8>`, serialized structured values |

use std::fmt;
use std::str::FromStr;

/// A single entry as held by a [`Store`](crate::store::Store).
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Data(Vec<u8>),
}

impl RawValue {
    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Data(_) => "data",
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view. Integers widen, matching how preferences stores hand back
    /// numbers that were written as whole values.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Data(d) => Some(d),
            _ => None,
        }
    }
}

/// Renders the value for humans. Byte blobs are shown as lossy UTF-8.
impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Data(d) => write!(f, "<{} bytes> {}", d.len(), String::from_utf8_lossy(d)),
        }
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Data(v)
    }
}

// ---------------------------------------------------------------------------
// Url
// ---------------------------------------------------------------------------

/// An absolute URL, stored as its string form.
///
/// Validation is limited to what distinguishes a URL from arbitrary text: a
/// scheme (`ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`), a `:` separator,
/// and no whitespace or control characters anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    text: String,
    scheme_end: usize,
}

/// Why a string was rejected by [`Url::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlParseError {
    /// No `scheme:` prefix.
    MissingScheme,
    /// The scheme contains a character outside the allowed set.
    InvalidScheme(String),
    /// Whitespace or a control character at the given byte offset.
    InvalidCharacter(usize),
}

impl fmt::Display for UrlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingScheme => write!(f, "missing URL scheme"),
            Self::InvalidScheme(s) => write!(f, "invalid URL scheme: {s}"),
            Self::InvalidCharacter(at) => write!(f, "invalid character at byte {at}"),
        }
    }
}

impl std::error::Error for UrlParseError {}

impl Url {
    /// Parse an absolute URL.
    pub fn parse(input: &str) -> Result<Self, UrlParseError> {
        if let Some(at) = input.find(|c: char| c.is_whitespace() || c.is_control()) {
            return Err(UrlParseError::InvalidCharacter(at));
        }
        let scheme_end = input.find(':').ok_or(UrlParseError::MissingScheme)?;
        let scheme = &input[..scheme_end];
        let mut chars = scheme.chars();
        let valid = match chars.next() {
            Some(first) => {
                first.is_ascii_alphabetic()
                    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            }
            None => false,
        };
        if !valid {
            return Err(UrlParseError::InvalidScheme(scheme.to_owned()));
        }
        Ok(Self {
            text: input.to_owned(),
            scheme_end,
        })
    }

    /// The scheme, without the trailing `:`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.text[..self.scheme_end]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for Url {
    type Err = UrlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
