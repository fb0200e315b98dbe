//! Serving recorded responses.

use super::headers::{MarkerHeadersExt, X_C8YCTRL_MOCKED};
use super::state::{ControllerState, SharedPact};
use super::types::{build_response, error_response};
use crate::pact::{find_header, PactRequest, PactResponse};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue as HttpHeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde_json::Value;
use tracing::debug;

/// Headers always carried over from a recorded response.
const MOCK_RESPONSE_HEADERS: [&str; 2] = ["content-type", "set-cookie"];

/// Supplies a response when strict mocking finds no record.
pub trait MockNotFoundResponder: Send + Sync {
    /// `None` falls back to the configured or built-in not-found response.
    fn respond(&self, request: &PactRequest) -> Option<PactResponse>;
}

/// Recorded response for `request`, advancing the pact's replay position.
pub fn lookup(
    state: &ControllerState,
    pact: &SharedPact,
    request: &PactRequest,
) -> Option<PactResponse> {
    let mut pact = pact.lock();
    let matcher = state.url_matcher_for(&pact);
    let sequencing = state.config.mock_sequencing;
    let record = pact.next_record_matching_request(request, &matcher, sequencing)?;
    Some(record.response.clone())
}

/// HTTP response for a recorded `response`. Only content type, cookies and
/// the configured extra headers are replayed.
pub fn build_mock_response(
    response: &PactResponse,
    extra_headers: &[String],
) -> Response<Full<Bytes>> {
    let status = response
        .status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::OK);

    let body = match &response.body {
        None | Some(Value::Null) => Bytes::new(),
        Some(Value::String(text)) => Bytes::from(text.clone()),
        Some(other) => Bytes::from(other.to_string()),
    };
    let mut http_response = build_response(status, body);

    let replayed = MOCK_RESPONSE_HEADERS
        .iter()
        .copied()
        .chain(extra_headers.iter().map(String::as_str));
    for name in replayed {
        let Some(values) = find_header(&response.headers, name) else {
            continue;
        };
        let Ok(header_name) = HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()) else {
            continue;
        };
        for value in values.values() {
            if let Ok(header_value) = HttpHeaderValue::from_str(value) {
                http_response
                    .headers_mut()
                    .append(header_name.clone(), header_value);
            }
        }
    }

    let is_json_body = matches!(&response.body, Some(Value::Object(_)) | Some(Value::Array(_)));
    if is_json_body && !http_response.headers().contains_key(CONTENT_TYPE) {
        http_response
            .headers_mut()
            .insert(CONTENT_TYPE, HttpHeaderValue::from_static("application/json"));
    }
    http_response.mark(&X_C8YCTRL_MOCKED);
    http_response
}

/// Response for a strict-mocking miss: the injected responder, then the
/// configured response, then a fixed 404.
pub fn not_found_response(state: &ControllerState, request: &PactRequest) -> Response<Full<Bytes>> {
    let method = request.method.as_deref().unwrap_or("?");
    let url = request.url.as_deref().unwrap_or("?");
    debug!("No recording found for {} {}", method, url);

    if let Some(response) = state
        .not_found_responder
        .as_ref()
        .and_then(|responder| responder.respond(request))
    {
        return build_mock_response(&response, &state.config.mock_response_headers);
    }

    if let Some(configured) = &state.config.mock_not_found_response {
        let status = StatusCode::from_u16(configured.status).unwrap_or(StatusCode::NOT_FOUND);
        let body = match &configured.body {
            None => Bytes::new(),
            Some(Value::String(text)) => Bytes::from(text.clone()),
            Some(other) => Bytes::from(other.to_string()),
        };
        let mut response = build_response(status, body);
        for (name, value) in &configured.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HttpHeaderValue::from_str(value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response.mark(&X_C8YCTRL_MOCKED);
        return response;
    }

    let mut response = error_response(
        StatusCode::NOT_FOUND,
        &format!("Recording Not Found: {method} {url}"),
    );
    response.mark(&X_C8YCTRL_MOCKED);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pact::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_mock_response_filters_headers() {
        let mut response = PactResponse::new(201).with_body(json!({"id": "42"}));
        response.headers.insert(
            "Content-Type".into(),
            HeaderValue::Single("application/vnd.com.nsn.cumulocity.managedobject+json".into()),
        );
        response
            .headers
            .insert("X-Internal".into(), HeaderValue::Single("secret".into()));
        response
            .headers
            .insert("X-Custom".into(), HeaderValue::Single("kept".into()));
        response.headers.insert(
            "Set-Cookie".into(),
            HeaderValue::Multi(vec!["a=1".into(), "b=2".into()]),
        );

        let http = build_mock_response(&response, &["x-custom".to_string()]);
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(
            http.headers().get(CONTENT_TYPE).unwrap(),
            "application/vnd.com.nsn.cumulocity.managedobject+json"
        );
        assert_eq!(http.headers().get_all("set-cookie").iter().count(), 2);
        assert_eq!(http.headers().get("x-custom").unwrap(), "kept");
        assert!(http.headers().get("x-internal").is_none());
        assert_eq!(http.headers().get("x-c8yctrl-mocked").unwrap(), "true");
    }

    #[test]
    fn test_json_body_defaults_content_type() {
        let response = PactResponse::new(200).with_body(json!([1, 2]));
        let http = build_mock_response(&response, &[]);
        assert_eq!(http.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_text_body_is_served_raw() {
        let response = PactResponse::new(200).with_body(json!("plain"));
        let http = build_mock_response(&response, &[]);
        assert!(http.headers().get(CONTENT_TYPE).is_none());
    }
}
