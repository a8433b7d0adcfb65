//! Request and response schemas of a route.

use std::any::{TypeId, type_name};
use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, Field, Result, from_value};

/// A typed request object whose fields carry a wire location.
///
/// Usually implemented with `#[derive(Request)]`.
pub trait RequestSchema: Send + Sync + 'static {
    /// The location-tagged fields, with renaming applied.
    fn fields(&self) -> Result<Vec<Field>>;
}

/// Request schema without any field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NoParams {}

impl RequestSchema for NoParams {
    fn fields(&self) -> Result<Vec<Field>> {
        Ok(Vec::new())
    }
}

/// Which route of a resource a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// The single-resource endpoint, e.g. `/items/{item_name}`.
    Resource,
    /// The collection endpoint, e.g. `/items`.
    Collection,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource => write!(f, "resource"),
            Self::Collection => write!(f, "collection"),
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// A typed request object whose concrete type is remembered.
pub struct TypedParams {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn RequestSchema>,
}

impl TypedParams {
    /// Name of the concrete request type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Parameters of a verb call.
#[derive(Default)]
pub enum Params {
    /// No parameters: the request schema is built from an empty object.
    #[default]
    None,
    /// A raw JSON object, validated against the request schema.
    Raw(Value),
    /// An already typed request object.
    Typed(TypedParams),
}

impl Params {
    /// Parameters from a raw JSON object.
    #[must_use]
    pub fn raw(value: Value) -> Self {
        Self::Raw(value)
    }
}

impl<T: RequestSchema> From<T> for Params {
    fn from(value: T) -> Self {
        Self::Typed(TypedParams {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            value: Box::new(value),
        })
    }
}

impl From<Option<Value>> for Params {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::None, Self::Raw)
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "Params::None"),
            Self::Raw(value) => f.debug_tuple("Params::Raw").field(value).finish(),
            Self::Typed(typed) => write!(f, "Params::Typed({})", typed.type_name),
        }
    }
}

// ============================================================================
// Schema descriptors
// ============================================================================

fn raw_into<T: RequestSchema + DeserializeOwned>(value: Value) -> Result<Box<dyn RequestSchema>> {
    let typed: T = from_value(value)?;
    Ok(Box::new(typed))
}

/// Runtime descriptor of a request schema.
#[derive(Clone, Copy)]
pub struct RequestSchemaInfo {
    type_id: TypeId,
    type_name: &'static str,
    from_raw: fn(Value) -> Result<Box<dyn RequestSchema>>,
}

impl RequestSchemaInfo {
    /// Descriptor of `T`.
    #[must_use]
    pub fn of<T: RequestSchema + DeserializeOwned>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            from_raw: raw_into::<T>,
        }
    }

    /// Name of the request type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Coerce call parameters into this schema.
    ///
    /// `None` builds the schema from `{}`, so required fields surface as a
    /// [`Error::SchemaValidation`]. Raw parameters that are not a JSON object
    /// fail the same way, at the root path. A typed object of another type
    /// fails with [`Error::WrongRequestType`].
    pub fn coerce(&self, params: Params) -> Result<Box<dyn RequestSchema>> {
        match params {
            Params::None => (self.from_raw)(Value::Object(serde_json::Map::new())),
            Params::Raw(value @ Value::Object(_)) => (self.from_raw)(value),
            Params::Raw(other) => Err(Error::schema_validation(
                ".",
                format!("expected a JSON object, got {other}"),
            )),
            Params::Typed(typed) if typed.type_id == self.type_id => Ok(typed.value),
            Params::Typed(typed) => Err(Error::WrongRequestType {
                expected: self.type_name,
                actual: typed.type_name,
            }),
        }
    }
}

impl fmt::Debug for RequestSchemaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestSchemaInfo")
            .field(&self.type_name)
            .finish()
    }
}

/// Runtime descriptor of a response schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSchemaInfo {
    type_id: TypeId,
    type_name: &'static str,
}

impl ResponseSchemaInfo {
    /// Descriptor of `T`.
    #[must_use]
    pub fn of<T: DeserializeOwned + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the response type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check that `T` is the declared response type.
    ///
    /// [`serde_json::Value`] always matches and yields the raw payload.
    pub fn check<T: 'static>(&self) -> Result<()> {
        let requested = TypeId::of::<T>();
        if requested == self.type_id || requested == TypeId::of::<Value>() {
            Ok(())
        } else {
            Err(Error::WrongResponseType {
                expected: self.type_name,
                actual: type_name::<T>(),
            })
        }
    }

    /// Validate a JSON payload against this schema and return it as `T`.
    pub fn parse<T: DeserializeOwned + 'static>(&self, value: Value) -> Result<T> {
        self.check::<T>()?;
        from_value(value)
    }
}

/// Request and optional response schema of one (route, method) pair.
#[derive(Debug, Clone, Copy)]
pub struct RouteSchema {
    /// Request schema.
    pub request: RequestSchemaInfo,
    /// Response schema; `None` when the route returns nothing to parse.
    pub response: Option<ResponseSchemaInfo>,
}
