//! Request message model carried inside envelopes.
//!
//! Any `Serialize` type can be sent through the facade; `RequestMessage` is
//! the HTTP-shaped payload the protocol was built around.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A header, query parameter or trailer value: one string or several.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Single value
    Single(String),
    /// Repeated field
    Many(Vec<String>),
}

impl FieldValue {
    /// All values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }

    fn push(self, value: String) -> Self {
        match self {
            Self::Single(existing) => Self::Many(vec![existing, value]),
            Self::Many(mut values) => {
                values.push(value);
                Self::Many(values)
            },
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Field name to value(s).
pub type FieldMap = BTreeMap<String, FieldValue>;

/// HTTP-style request.
///
/// Serialized in camelCase; absent optional parts are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    /// Request method, e.g. `GET`
    pub method: String,
    /// Request path, e.g. `/hello`
    pub path: String,
    /// Request headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<FieldMap>,
    /// Query parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<FieldMap>,
    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Trailers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailers: Option<FieldMap>,
}

impl RequestMessage {
    /// Request with only a method and a path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method: method.into(), path: path.into(), ..Self::default() }
    }

    /// Add a header. A repeated name collects its values.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        append(self.headers.get_or_insert_with(FieldMap::new), name.into(), value.into());
        self
    }

    /// Add a query parameter. A repeated name collects its values.
    #[must_use]
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        append(self.query_params.get_or_insert_with(FieldMap::new), name.into(), value.into());
        self
    }

    /// Add a trailer. A repeated name collects its values.
    #[must_use]
    pub fn with_trailer(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        append(self.trailers.get_or_insert_with(FieldMap::new), name.into(), value.into());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref()?.get(name)?.first()
    }
}

fn append(map: &mut FieldMap, name: String, value: String) {
    let merged = match map.remove(&name) {
        Some(existing) => existing.push(value),
        None => FieldValue::Single(value),
    };
    map.insert(name, merged);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_request_omits_optional_parts() {
        let json = serde_json::to_string(&RequestMessage::new("GET", "/hello")).unwrap();
        assert_eq!(json, r#"{"method":"GET","path":"/hello"}"#);
    }

    #[test]
    fn field_names_are_camel_case() {
        let request = RequestMessage::new("GET", "/search").with_query_param("q", "nile");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["queryParams"]["q"], "nile");
    }

    #[test]
    fn single_or_many_values_parse() {
        let request: RequestMessage = serde_json::from_str(
            r#"{"method":"POST","path":"/","headers":{"accept":"text/plain","via":["a","b"]}}"#,
        )
        .unwrap();
        let headers = request.headers.as_ref().unwrap();

        assert_eq!(headers["accept"], FieldValue::Single("text/plain".into()));
        assert_eq!(headers["via"].values(), vec!["a", "b"]);
        assert_eq!(request.header("via"), Some("a"));
    }

    #[test]
    fn repeated_header_collects_values() {
        let request = RequestMessage::new("GET", "/")
            .with_header("via", "a")
            .with_header("via", "b")
            .with_header("via", "c");

        assert_eq!(request.headers.unwrap()["via"].values(), vec!["a", "b", "c"]);
    }

    #[test]
    fn body_and_trailers_roundtrip() {
        let request = RequestMessage::new("PUT", "/doc")
            .with_body("{\"k\":1}")
            .with_trailer("checksum", "abc");
        let json = serde_json::to_string(&request).unwrap();

        assert_eq!(serde_json::from_str::<RequestMessage>(&json).unwrap(), request);
    }
}
