//! Forwarding to the backend and capturing responses into the current pact.

use super::headers::{MarkerHeadersExt, X_C8YCTRL_PROXIED, X_C8YCTRL_RECORDED};
use super::state::{ControllerState, SharedPact};
use super::types::{error_response, pact_error_response};
use crate::error::PactError;
use crate::pact::{
    HeaderValue, Headers, PactAuth, PactRecord, PactRequest, PactResponse, RecordingMode,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT_ENCODING, AUTHORIZATION, CONNECTION, HOST, TRANSFER_ENCODING};
use hyper::http::request::Parts;
use hyper::{HeaderMap, Request, Response, StatusCode};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Forward a request with a pre-collected body. When `recording` is set the
/// response is appended to that pact according to the recording mode.
pub async fn forward(
    state: &ControllerState,
    parts: &Parts,
    body: Bytes,
    recording: Option<(SharedPact, RecordingMode)>,
) -> Response<Full<Bytes>> {
    let Some(base_url) = &state.base_url else {
        warn!("Cannot proxy {} {}: no baseUrl configured", parts.method, parts.uri);
        return error_response(StatusCode::BAD_GATEWAY, "No baseUrl configured");
    };
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("{}{}", base_url.as_str().trim_end_matches('/'), path_and_query);
    debug!("Forwarding to: {}", target);

    let mut headers = parts.headers.clone();
    headers.remove(HOST);
    if recording.is_some() {
        // Recorded bodies must be readable
        headers.remove(ACCEPT_ENCODING);
    }
    // Credentials never reach a pact file; the record keeps only the user
    let recorded_headers = recorded_request_headers(&headers);
    if recording.is_some() {
        if !headers.contains_key(AUTHORIZATION) {
            if let Some(auth) = &state.config.auth {
                if let Ok(value) = auth.basic_header().parse::<hyper::header::HeaderValue>() {
                    headers.insert(AUTHORIZATION, value);
                }
            }
        }
    }

    let mut builder = Request::builder().method(parts.method.clone()).uri(&target);
    if let Some(request_headers) = builder.headers_mut() {
        *request_headers = headers.clone();
    }
    let upstream_request = match builder.body(Full::new(body.clone())) {
        Ok(request) => request,
        Err(e) => return transport_error(target, e.to_string()),
    };

    let started = Instant::now();
    let upstream_response = match state.client.request(upstream_request).await {
        Ok(response) => response,
        Err(e) => return transport_error(target, e.to_string()),
    };
    let (mut response_parts, response_body) = upstream_response.into_parts();
    let response_bytes = match response_body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return transport_error(target, format!("failed to read response body: {e}"))
        }
    };
    let duration = started.elapsed().as_millis() as u64;

    response_parts.headers.remove(TRANSFER_ENCODING);
    response_parts.headers.remove(CONNECTION);
    let mut response = Response::from_parts(response_parts, Full::new(response_bytes.clone()));
    response.mark(&X_C8YCTRL_PROXIED);

    if let Some((pact, mode)) = recording {
        let mut request = PactRequest::new(parts.method.as_str(), path_and_query);
        request.headers = recorded_headers;
        request.body = body_value(&body);

        let mut recorded = PactResponse::new(response.status().as_u16());
        recorded.status_text = response.status().canonical_reason().map(str::to_string);
        recorded.headers = to_pact_headers(response.headers());
        recorded.body = body_value(&response_bytes);
        recorded.duration = Some(duration);

        let mut record = PactRecord::new(request, recorded);
        record.auth = auth_of(state, &headers);
        if record_into(state, &pact, record, mode) {
            response.mark(&X_C8YCTRL_RECORDED);
        }
    }
    response
}

fn transport_error(url: String, message: String) -> Response<Full<Bytes>> {
    let error = PactError::ProxyTransport { url, message };
    error!("{}", error);
    pact_error_response(&error)
}

/// Preprocess `record` and merge it into `pact`. Returns whether the pact
/// changed; a change schedules a save.
pub fn record_into(
    state: &ControllerState,
    pact: &SharedPact,
    mut record: PactRecord,
    mode: RecordingMode,
) -> bool {
    let (id, options) = {
        let pact = pact.lock();
        (pact.id.clone(), pact.info.preprocessor.clone())
    };
    if let Err(e) = state.preprocessor.apply_to_record(&mut record, options.as_ref()) {
        error!("Dropping record for pact '{}': {}", id, e);
        return false;
    }
    let changed = pact.lock().apply_record(record, mode);
    if changed {
        debug!("Recorded into pact '{}' ({})", id, mode);
        state.persist(pact);
    } else {
        debug!("Record not added to pact '{}' ({})", id, mode);
    }
    changed
}

/// Auth descriptor for a record: the user of a Basic header, else the
/// configured user.
fn auth_of(state: &ControllerState, headers: &HeaderMap) -> Option<PactAuth> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|credentials| credentials.split(':').next().map(str::to_string))
        .map(|user| PactAuth {
            user: Some(user),
            alias: None,
            auth_type: Some("BasicAuth".to_string()),
        });
    from_header.or_else(|| state.config.auth.as_ref().map(|a| a.pact_auth()))
}

fn recorded_request_headers(headers: &HeaderMap) -> Headers {
    let mut recorded = to_pact_headers(headers);
    recorded.retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION.as_str()));
    recorded
}

pub fn to_pact_headers(headers: &HeaderMap) -> Headers {
    let mut result = Headers::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        match result.get_mut(name.as_str()) {
            Some(existing) => existing.push(value.to_string()),
            None => {
                result.insert(name.as_str().to_string(), HeaderValue::from(value));
            }
        }
    }
    result
}

/// JSON when the body parses, text when it is UTF-8, nothing otherwise.
pub fn body_value(body: &Bytes) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_slice(body) {
        return Some(json);
    }
    std::str::from_utf8(body)
        .ok()
        .map(|text| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_value() {
        assert_eq!(body_value(&Bytes::new()), None);
        assert_eq!(
            body_value(&Bytes::from(r#"{"id":"42"}"#)),
            Some(json!({"id": "42"}))
        );
        assert_eq!(body_value(&Bytes::from("plain")), Some(json!("plain")));
        assert_eq!(body_value(&Bytes::from_static(&[0xff, 0xfe])), None);
    }

    #[test]
    fn test_recorded_headers_drop_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic YWRtaW46czNjcmV0".parse().unwrap());
        headers.insert("accept", "application/json".parse().unwrap());
        let recorded = recorded_request_headers(&headers);
        assert!(!recorded.contains_key("authorization"));
        assert_eq!(
            recorded["accept"],
            HeaderValue::Single("application/json".into())
        );
    }

    #[test]
    fn test_repeated_headers_become_lists() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", "a=1".parse().unwrap());
        headers.append("set-cookie", "b=2".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        let converted = to_pact_headers(&headers);
        assert_eq!(
            converted["set-cookie"],
            HeaderValue::Multi(vec!["a=1".into(), "b=2".into()])
        );
        assert_eq!(
            converted["content-type"],
            HeaderValue::Single("application/json".into())
        );
    }
}
