//! Prelude module for convenient imports.
//!
//! ```ignore
//! use rivet_core::prelude::*;
//! ```

pub use crate::{
    CollectionIterator, Error, ErrorParser, Field, FieldLocation, HttpError, Method, NoParams,
    Params, RequestSchema, ResponseBox, Result, Secret, Timeout, WireRequest, WireResponse,
};
