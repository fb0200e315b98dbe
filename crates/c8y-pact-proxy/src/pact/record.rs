//! Pact record types: one captured request/response exchange.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Header value as recorded: a single string or a list for repeated headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    /// All values of the header in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::Single(v) => vec![v.as_str()],
            HeaderValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Add another value, turning a single value into a list.
    pub fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(existing) => {
                *self = HeaderValue::Multi(vec![std::mem::take(existing), value]);
            }
            HeaderValue::Multi(vs) => vs.push(value),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Single(value.to_string())
    }
}

pub type Headers = BTreeMap<String, HeaderValue>;

/// Look up a header ignoring case.
pub fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a HeaderValue> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Recorded request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PactRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl PactRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: Some(method.to_uppercase()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    /// Same method (ignoring case) and same url string.
    pub fn same_endpoint(&self, other: &PactRequest) -> bool {
        let methods_match = match (&self.method, &other.method) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        methods_match && self.url == other.url
    }
}

/// Recorded response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PactResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// JSON Schema the body must satisfy, used instead of a literal body
    #[serde(rename = "$body", default, skip_serializing_if = "Option::is_none")]
    pub body_schema: Option<Value>,
    /// Round-trip duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub is_ok_status_code: bool,
}

impl PactResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status: Some(status),
            is_ok_status_code: is_ok_status(status),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

pub fn is_ok_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Authentication used for a recorded request. Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PactAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
}

/// Client options relevant when replaying a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PactOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on_status_code: Option<bool>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, Value>,
}

/// One captured HTTP exchange plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PactRecord {
    pub request: PactRequest,
    pub response: PactResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<PactAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PactOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_object: Option<String>,
}

impl PactRecord {
    pub fn new(request: PactRequest, response: PactResponse) -> Self {
        let mut record = Self {
            request,
            response,
            auth: None,
            options: None,
            created_object: None,
        };
        record.created_object = record.extract_created_object();
        record
    }

    pub fn with_auth(mut self, auth: PactAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_options(mut self, options: PactOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Records without method and url cannot be looked up during replay.
    pub fn is_replayable(&self) -> bool {
        self.request.method.is_some() && self.request.url.is_some()
    }

    /// Id of the object a successful POST created, taken from `body.id`.
    fn extract_created_object(&self) -> Option<String> {
        let is_post = self
            .request
            .method
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("POST"));
        let status = self.response.status?;
        if !is_post || !is_ok_status(status) {
            return None;
        }
        match self.response.body.as_ref()?.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Equivalence used by the `new` recording mode: same request line and
    /// body, same response status and body. Headers and timing are ignored.
    pub fn is_equivalent(&self, other: &PactRecord) -> bool {
        self.request.same_endpoint(&other.request)
            && self.request.body == other.request.body
            && self.response.status == other.response.status
            && self.response.body == other.response.body
    }
}
