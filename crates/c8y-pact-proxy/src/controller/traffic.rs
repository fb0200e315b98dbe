//! Non-administrative requests: mock first, then proxy.

use super::state::ControllerState;
use super::types::error_response;
use super::{mock, proxy};
use crate::pact::PactRequest;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

pub async fn handle(
    req: Request<Incoming>,
    state: Arc<ControllerState>,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read request body: {e}"),
            )
        }
    };

    let session = state.session();

    if session.mode.is_mocking() {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let request = PactRequest::new(parts.method.as_str(), path_and_query);
        match &session.current {
            Some(pact) => {
                if let Some(response) = mock::lookup(&state, pact, &request) {
                    let extra_headers = &state.config.mock_response_headers;
                    return mock::build_mock_response(&response, extra_headers);
                }
            }
            None => debug!(
                "Mocking without a current pact: {} {}",
                parts.method, path_and_query
            ),
        }
        if state.strict_mocking(&session) {
            return mock::not_found_response(&state, &request);
        }
        return proxy::forward(&state, &parts, body, None).await;
    }

    let recording = if session.mode.is_recording() {
        match session.current {
            Some(pact) => Some((pact, session.recording_mode)),
            None => {
                debug!(
                    "Recording without a current pact, {} {} is not recorded",
                    parts.method, parts.uri
                );
                None
            }
        }
    } else {
        None
    };
    proxy::forward(&state, &parts, body, recording).await
}
