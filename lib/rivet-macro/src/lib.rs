//! Procedural macros for the rivet REST client.
//!
//! - `#[derive(Request)]` - Attach a wire location to every field of a request struct

mod request_derive;

use proc_macro::TokenStream;

/// Derive `rivet::RequestSchema` for a struct.
///
/// Every field is sent in the body unless it carries a location attribute.
///
/// # Field Attributes
///
/// - `#[field(path)]` - Substituted into the `{name}` placeholder of the route
/// - `#[field(query)]` - Appended to the query string; `Vec<T>` repeats the key
/// - `#[field(header)]` - Sent as a header
/// - `#[field(body)]` - Serialized into the body (default)
/// - `#[field(rename = "name")]` - Wire name (overrides `rename_all`)
/// - `#[field(skip)]` - Not sent
///
/// `None` values are omitted from headers, query and body encodings that
/// skip nulls. A `None` path value is an error at call time.
///
/// # Struct Attributes
///
/// - `#[field(rename_all = "...")]` - One of `lowercase`, `UPPERCASE`,
///   `camelCase`, `PascalCase`, `snake_case`, `SCREAMING_SNAKE_CASE`,
///   `kebab-case`, `SCREAMING-KEBAB-CASE`, `Train-Case`
///
/// # Example
///
/// ```ignore
/// use rivet::Request;
/// use serde::Deserialize;
///
/// #[derive(Request, Deserialize)]
/// struct UpdateItem {
///     #[field(path)]
///     item_name: String,
///     #[field(header, rename = "If-Match")]
///     etag: Option<String>,
///     price: u32,                // body
/// }
/// ```
#[proc_macro_derive(Request, attributes(field))]
pub fn derive_request(input: TokenStream) -> TokenStream {
    request_derive::expand_request_derive(input.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
