//! List-shaped responses.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, Link, ResponseSchemaInfo, Result, WireResponse, from_value};

/// Default header carrying the total number of items of a paginated list.
pub const TOTAL_COUNT_HEADER: &str = "Total-Count";

/// Pagination metadata of a collection response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// Number of items in this response.
    pub count: usize,
    /// Total number of items, when the server reports it.
    pub total_count: Option<u64>,
    /// Links of the `Link` header, keyed by `rel`.
    pub links: BTreeMap<String, Link>,
}

/// Extracts items and metadata from a collection response.
pub trait CollectionParser: Send + Sync + 'static {
    /// The raw items, in order.
    fn items(&self, response: &WireResponse) -> Result<Vec<Value>>;

    /// Pagination metadata; `count` is the number of items.
    fn meta(&self, response: &WireResponse, count: usize) -> Metadata;
}

/// Expects a JSON array body and reads the total from a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultCollectionParser {
    total_count_header: String,
}

impl DefaultCollectionParser {
    /// Read the total count from another header.
    #[must_use]
    pub fn with_total_count_header(header: impl Into<String>) -> Self {
        Self {
            total_count_header: header.into(),
        }
    }
}

impl Default for DefaultCollectionParser {
    fn default() -> Self {
        Self::with_total_count_header(TOTAL_COUNT_HEADER)
    }
}

impl CollectionParser for DefaultCollectionParser {
    fn items(&self, response: &WireResponse) -> Result<Vec<Value>> {
        match response.json() {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(Value::Null) => Ok(Vec::new()),
            _ => Err(Error::schema_validation(
                "",
                "collection response is not a JSON array",
            )),
        }
    }

    fn meta(&self, response: &WireResponse, count: usize) -> Metadata {
        Metadata {
            count,
            total_count: response
                .header(&self.total_count_header)
                .and_then(|value| value.trim().parse().ok()),
            links: response.links(),
        }
    }
}

/// Forward-only, single-pass iterator over the items of a collection
/// response.
///
/// Each item is validated against the item schema when one is declared;
/// iterating as [`serde_json::Value`] yields the raw items. Once exhausted it
/// keeps returning `None`.
pub struct CollectionIterator<T> {
    response: WireResponse,
    schema: Option<ResponseSchemaInfo>,
    items: Vec<Value>,
    cursor: usize,
    meta: Metadata,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CollectionIterator<T> {
    /// Build the iterator; fails if the parser cannot extract the items.
    pub fn new(
        response: WireResponse,
        schema: Option<ResponseSchemaInfo>,
        parser: &dyn CollectionParser,
    ) -> Result<Self> {
        let items = parser.items(&response)?;
        let meta = parser.meta(&response, items.len());
        Ok(Self {
            response,
            schema,
            items,
            cursor: 0,
            meta,
            _marker: PhantomData,
        })
    }

    /// Pagination metadata.
    #[must_use]
    pub const fn meta(&self) -> &Metadata {
        &self.meta
    }

    /// The raw response.
    #[must_use]
    pub const fn response(&self) -> &WireResponse {
        &self.response
    }
}

impl<T: DeserializeOwned + 'static> Iterator for CollectionIterator<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.get_mut(self.cursor).map(Value::take)?;
        self.cursor += 1;
        Some(match &self.schema {
            Some(schema) => schema.parse(item),
            None => from_value(item),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.items.len().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl<T: DeserializeOwned + 'static> ExactSizeIterator for CollectionIterator<T> {}

impl<T: DeserializeOwned + 'static> FusedIterator for CollectionIterator<T> {}

impl<T> fmt::Debug for CollectionIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionIterator")
            .field("meta", &self.meta)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct User {
        name: String,
    }

    fn response(total: Option<&str>, body: &[u8]) -> WireResponse {
        let mut headers = HashMap::new();
        if let Some(total) = total {
            headers.insert("Total-Count".to_string(), total.to_string());
        }
        WireResponse::from_bytes(200, headers, body)
    }

    #[test]
    fn iterates_items_with_metadata() {
        let mut users: CollectionIterator<User> = CollectionIterator::new(
            response(Some("10"), br#"[{"name":"alice"},{"name":"bob"}]"#),
            Some(ResponseSchemaInfo::of::<User>()),
            &DefaultCollectionParser::default(),
        )
        .expect("collection");

        assert_eq!(users.meta().count, 2);
        assert_eq!(users.meta().total_count, Some(10));
        assert_eq!(users.len(), 2);

        let alice = users.next().expect("first").expect("valid");
        assert_eq!(alice.name, "alice");
        let bob = users.next().expect("second").expect("valid");
        assert_eq!(bob.name, "bob");
        assert!(users.next().is_none());
        assert!(users.next().is_none());
    }

    #[test]
    fn total_count_is_optional() {
        let users: CollectionIterator<User> = CollectionIterator::new(
            response(None, br#"[{"name":"alice"}]"#),
            None,
            &DefaultCollectionParser::default(),
        )
        .expect("collection");
        assert_eq!(users.meta().total_count, None);
        assert_eq!(users.meta().count, 1);
    }

    #[test]
    fn custom_total_count_header() {
        let mut headers = HashMap::new();
        headers.insert("X-Total".to_string(), "42".to_string());
        let users: CollectionIterator<Value> = CollectionIterator::new(
            WireResponse::from_bytes(200, headers, b"[]"),
            None,
            &DefaultCollectionParser::with_total_count_header("x-total"),
        )
        .expect("collection");
        assert_eq!(users.meta().total_count, Some(42));
    }

    #[test]
    fn items_validated_independently() {
        let users: Vec<Result<User>> = CollectionIterator::new(
            response(None, br#"[{"name":"alice"},{"nom":"bob"},{"name":"carol"}]"#),
            Some(ResponseSchemaInfo::of::<User>()),
            &DefaultCollectionParser::default(),
        )
        .expect("collection")
        .collect();

        assert_eq!(users.len(), 3);
        assert!(users.first().is_some_and(Result::is_ok));
        assert!(matches!(users.get(1), Some(Err(Error::SchemaValidation { .. }))));
        assert!(users.get(2).is_some_and(Result::is_ok));
    }

    #[test]
    fn raw_items_without_schema() {
        let items: Vec<Value> = CollectionIterator::<Value>::new(
            response(None, br#"[1, "two", {"three": 3}]"#),
            None,
            &DefaultCollectionParser::default(),
        )
        .expect("collection")
        .collect::<Result<_>>()
        .expect("raw");
        assert_eq!(items, vec![json!(1), json!("two"), json!({"three": 3})]);
    }

    #[test]
    fn non_list_body_is_rejected() {
        let err = CollectionIterator::<Value>::new(
            response(None, br#"{"items":[]}"#),
            None,
            &DefaultCollectionParser::default(),
        )
        .expect_err("not a list");
        assert!(matches!(err, Error::SchemaValidation { .. }));
    }
}
