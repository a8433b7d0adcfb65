//! Location-tagged request fields.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Where a request field is sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLocation {
    /// Substituted into a `{name}` placeholder of the URL pattern.
    Path,
    /// Sent as an HTTP header.
    Header,
    /// Appended to the query string.
    Query,
    /// Serialized into the request body.
    Body,
}

impl fmt::Display for FieldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Header => write!(f, "header"),
            Self::Query => write!(f, "query"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// A single request field: its wire name, location and resolved value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Wire name, after renaming.
    pub name: String,
    /// Where the field is sent.
    pub location: FieldLocation,
    /// Resolved value; `Null` means absent.
    pub value: serde_json::Value,
}

impl Field {
    /// Create a field from an already resolved JSON value.
    #[must_use]
    pub fn new(name: impl Into<String>, location: FieldLocation, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            location,
            value,
        }
    }

    /// Create a field by serializing a value.
    ///
    /// [`Secret`] values are unwrapped here.
    pub fn serialize<T: Serialize + ?Sized>(
        name: impl Into<String>,
        location: FieldLocation,
        value: &T,
    ) -> crate::Result<Self> {
        let value = serde_json::to_value(value)?;
        Ok(Self::new(name, location, value))
    }
}

/// A sensitive value, masked in `Debug` and `Display`.
///
/// Serialization emits the plain value so the wire request carries it.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    /// Wrap a sensitive value.
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the plain value.
    pub const fn expose(&self) -> &T {
        &self.0
    }

    /// Unwrap the plain value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

impl<T: Serialize> Serialize for Secret<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self)
    }
}
