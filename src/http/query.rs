//! Query-string container with multi-value field support.

use std::collections::HashMap;
use tracing::debug;

/// Parsed query parameters.
///
/// The query component is the part of the request target after the last
/// `?`. Assignments are delimited by `&` or `;`; a token that does not
/// contain exactly one `=` is skipped with a warning rather than failing
/// the request. A field may appear more than once; its values accumulate
/// in insertion order.
///
/// # Examples
/// ```
/// use forge_web::QueryParams;
///
/// let params = QueryParams::parse("name=john&age=25&tag=a;tag=b");
/// assert_eq!(params.get("name"), Some("john"));
/// assert_eq!(params.get_all("tag"), Some(&["a".to_string(), "b".to_string()][..]));
/// assert_eq!(params.get("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    fields: HashMap<String, Vec<String>>,
}

impl QueryParams {
    /// Parses a query-string component, with or without the leading `?`.
    pub fn parse(query: &str) -> Self {
        let mut params = QueryParams::default();
        let query = query.strip_prefix('?').unwrap_or(query);
        if query.trim().is_empty() {
            return params;
        }

        for assignment in query.split(['&', ';']) {
            if assignment.is_empty() {
                continue;
            }
            if assignment.matches('=').count() != 1 {
                debug!("skipping invalid query assignment {assignment:?}");
                continue;
            }
            // the count check above guarantees the split
            let (field, value) = match assignment.split_once('=') {
                Some(pair) => pair,
                None => continue,
            };
            params
                .fields
                .entry(field.to_owned())
                .or_default()
                .push(value.to_owned());
        }

        params
    }

    /// Returns the first value of the given field.
    #[inline]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value of the given field, in insertion order.
    #[inline]
    pub fn get_all(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The number of distinct fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}
