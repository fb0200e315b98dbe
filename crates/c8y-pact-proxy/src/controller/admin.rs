//! Administrative endpoints below the resource root.

use super::router::ControllerRoute;
use super::state::ControllerState;
use super::types::{
    collect_body, empty_response, error_response, json_response, method_not_allowed, not_found,
    pact_error_response, AdapterStatus, PactSummary, SelectionResponse, StatusDocument,
};
use crate::error::PactError;
use crate::keypath;
use crate::logging;
use crate::pact::{Pact, PactId, PactInfo, PactMode, PactVersion, RecordingMode, TitleTree};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn handle(
    route: Option<ControllerRoute>,
    req: Request<Incoming>,
    state: Arc<ControllerState>,
) -> Response<Full<Bytes>> {
    let Some(route) = route else {
        return not_found();
    };
    let method = req.method().clone();
    let query = req.uri().query().map(str::to_string);

    match (route, method) {
        (ControllerRoute::Root, Method::HEAD | Method::GET) => empty_response(StatusCode::OK),
        (ControllerRoute::Status, Method::GET) => handle_status(&state),
        (ControllerRoute::Current, Method::GET) => handle_get_current(&state),
        (ControllerRoute::Current, Method::POST) => {
            let body = match collect_body(req).await {
                Ok(body) => body,
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
            };
            match SelectParams::parse(query.as_deref(), &body) {
                Ok(params) => handle_select_current(&state, params).await,
                Err(message) => error_response(StatusCode::BAD_REQUEST, &message),
            }
        }
        (ControllerRoute::Current, Method::DELETE) => {
            state.update_session(|s| s.current = None);
            info!("Current pact deselected");
            empty_response(StatusCode::NO_CONTENT)
        }
        (ControllerRoute::CurrentClear, Method::POST) => handle_clear_current(&state),
        (ControllerRoute::CurrentRequest, Method::GET) => {
            handle_projection(&state, Projection::Request, query.as_deref())
        }
        (ControllerRoute::CurrentResponse, Method::GET) => {
            handle_projection(&state, Projection::Response, query.as_deref())
        }
        (ControllerRoute::Log, Method::GET) => {
            json_response(StatusCode::OK, &serde_json::json!({ "level": state.log_level.level() }))
        }
        (ControllerRoute::Log, Method::PUT) => match collect_body(req).await {
            Ok(body) => handle_set_log_level(&state, query.as_deref(), &body),
            Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
        },
        (ControllerRoute::Log, Method::POST) => match collect_body(req).await {
            Ok(body) => handle_log_message(&body),
            Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
        },
        (ControllerRoute::Pacts, Method::GET) => handle_list_pacts(&state).await,
        _ => method_not_allowed(),
    }
}

fn handle_status(state: &ControllerState) -> Response<Full<Bytes>> {
    let session = state.session();
    let document = StatusDocument {
        status: "ok",
        mode: session.mode,
        recording_mode: session.recording_mode,
        strict_mocking: state.strict_mocking(&session),
        mock_sequencing: state.config.mock_sequencing,
        pact: session.current.as_ref().map(|p| PactSummary::of(&p.lock())),
        base_url: state.config.base_url.clone(),
        tenant: state.config.tenant.clone(),
        adapter: AdapterStatus {
            folder: state.adapter.folder(),
        },
        log_level: state.log_level.level(),
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
    };
    json_response(StatusCode::OK, &document)
}

fn handle_get_current(state: &ControllerState) -> Response<Full<Bytes>> {
    match state.session().current {
        Some(pact) => json_response(StatusCode::OK, &*pact.lock()),
        None => empty_response(StatusCode::NO_CONTENT),
    }
}

/// Title given as a single segment or as a path of segments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TitleParam {
    Path(Vec<String>),
    Single(String),
}

impl TitleParam {
    fn into_segments(self) -> Vec<String> {
        match self {
            TitleParam::Path(segments) => segments,
            TitleParam::Single(segment) => vec![segment],
        }
    }
}

/// Parameters of `POST {root}/current`; body values win over query values.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectParams {
    id: Option<String>,
    title: Option<TitleParam>,
    mode: Option<PactMode>,
    recording_mode: Option<RecordingMode>,
    strict_mocking: Option<bool>,
    clear: Option<bool>,
}

fn parse_flag(name: &str, value: &str) -> Result<bool, String> {
    match value {
        "" | "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(format!("Invalid value '{other}' for {name}")),
    }
}

impl SelectParams {
    fn parse(query: Option<&str>, body: &Bytes) -> Result<Self, String> {
        let mut params = SelectParams::default();
        let mut title = Vec::new();
        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "id" => params.id = Some(value.into_owned()),
                "title" => title.push(value.into_owned()),
                "mode" => params.mode = Some(value.parse()?),
                "recordingMode" => params.recording_mode = Some(value.parse()?),
                "strictMocking" => {
                    params.strict_mocking = Some(parse_flag("strictMocking", &value)?)
                }
                "clear" => params.clear = Some(parse_flag("clear", &value)?),
                _ => {}
            }
        }
        if !title.is_empty() {
            params.title = Some(TitleParam::Path(title));
        }

        if body.iter().any(|b| !b.is_ascii_whitespace()) {
            let from_body: SelectParams = serde_json::from_slice(body)
                .map_err(|e| format!("Invalid request body: {e}"))?;
            params.id = from_body.id.or(params.id);
            params.title = from_body.title.or(params.title);
            params.mode = from_body.mode.or(params.mode);
            params.recording_mode = from_body.recording_mode.or(params.recording_mode);
            params.strict_mocking = from_body.strict_mocking.or(params.strict_mocking);
            params.clear = from_body.clear.or(params.clear);
        }
        Ok(params)
    }
}

async fn handle_select_current(
    state: &ControllerState,
    params: SelectParams,
) -> Response<Full<Bytes>> {
    let title = params
        .title
        .map(TitleParam::into_segments)
        .unwrap_or_default();
    let id = match (&params.id, title.is_empty()) {
        (Some(id), _) => match PactId::parse(id) {
            Some(id) => id,
            None => {
                let message = format!("Invalid pact id '{id}'");
                return error_response(StatusCode::BAD_REQUEST, &message);
            }
        },
        (None, false) => PactId::from_title(&title),
        (None, true) => {
            return error_response(StatusCode::BAD_REQUEST, "Missing pact id or title")
        }
    };

    // Applied only once the pact is found or created
    let mut session = state.session();
    if let Some(mode) = params.mode {
        session.mode = mode;
    }
    if let Some(recording_mode) = params.recording_mode {
        session.recording_mode = recording_mode;
    }
    session.strict_mocking = params.strict_mocking.or(session.strict_mocking);

    let (pact, created) = match state.find_pact(&id).await {
        Ok(Some(pact)) => (pact, false),
        Ok(None) if session.mode.is_recording() => {
            (state.cache_pact(new_pact(state, id.clone(), title)), true)
        }
        Ok(None) => {
            warn!("Pact '{}' not found and recording is disabled", id);
            state.update_session(|s| s.current = None);
            return pact_error_response(&PactError::NotFound(id.to_string()));
        }
        Err(e) => {
            error!("Failed to load pact '{}': {}", id, e);
            state.update_session(|s| s.current = None);
            return pact_error_response(&e);
        }
    };

    let (summary, cleared) = {
        let mut guard = pact.lock();
        let mut cleared = false;
        if session.mode.is_recording() {
            if guard.start_session(session.recording_mode) {
                info!("Cleared records of pact '{}' (refresh)", id);
                cleared = true;
            }
        } else {
            guard.reset_cursor();
        }
        if params.clear == Some(true) {
            guard.clear_records();
            info!("Cleared records of pact '{}'", id);
            cleared = true;
        }
        (PactSummary::of(&guard), cleared)
    };
    if cleared && session.mode.is_recording() {
        state.persist(&pact);
    }

    session.current = Some(Arc::clone(&pact));
    let strict_mocking = state.strict_mocking(&session);
    let (mode, recording_mode) = (session.mode, session.recording_mode);
    state.update_session(|s| *s = session);
    info!(
        "Selected pact '{}' ({} records, mode {}, recording mode {})",
        id, summary.records, mode, recording_mode
    );

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    json_response(
        status,
        &SelectionResponse {
            pact: summary,
            created,
            mode,
            recording_mode,
            strict_mocking,
        },
    )
}

fn new_pact(state: &ControllerState, id: PactId, title: Vec<String>) -> Pact {
    let mut info = if title.is_empty() {
        PactInfo::with_title([id.to_string()])
    } else {
        PactInfo::with_title(title)
    };
    info.id = Some(id.to_string());
    info.tenant = state.config.tenant.clone();
    info.base_url = state.config.base_url.clone();
    info.version = Some(PactVersion::current());
    info!("Created pact '{}'", id);
    Pact::new(id, info)
}

fn handle_clear_current(state: &ControllerState) -> Response<Full<Bytes>> {
    let session = state.session();
    let Some(pact) = session.current else {
        return empty_response(StatusCode::NO_CONTENT);
    };
    let summary = {
        let mut guard = pact.lock();
        guard.clear_records();
        info!("Cleared records of pact '{}'", guard.id);
        PactSummary::of(&guard)
    };
    if session.mode.is_recording() {
        state.persist(&pact);
    }
    json_response(StatusCode::OK, &summary)
}

#[derive(Debug, Clone, Copy)]
enum Projection {
    Request,
    Response,
}

/// Selected fields of every record's request or response. Query parameter
/// names are key paths; without any, whole objects are returned.
fn handle_projection(
    state: &ControllerState,
    projection: Projection,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let Some(pact) = state.session().current else {
        return empty_response(StatusCode::NO_CONTENT);
    };
    let fields: Vec<String> = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .map(|(key, _)| key.into_owned())
        .collect();

    let projected: Result<Vec<Value>, serde_json::Error> = pact
        .lock()
        .records
        .iter()
        .map(|record| -> Result<Value, serde_json::Error> {
            let value = match projection {
                Projection::Request => serde_json::to_value(&record.request)?,
                Projection::Response => serde_json::to_value(&record.response)?,
            };
            Ok(project(&value, &fields))
        })
        .collect();
    match projected {
        Ok(values) => json_response(StatusCode::OK, &values),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn project(value: &Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return value.clone();
    }
    let selected: Map<String, Value> = fields
        .iter()
        .filter_map(|field| keypath::get(value, field).map(|v| (field.clone(), v.clone())))
        .collect();
    Value::Object(selected)
}

#[derive(Debug, Deserialize)]
struct LogLevelBody {
    level: String,
}

#[derive(Debug, Deserialize)]
struct LogMessageBody {
    message: String,
    #[serde(default)]
    level: Option<String>,
}

fn handle_set_log_level(
    state: &ControllerState,
    query: Option<&str>,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    let from_query = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .find(|(key, _)| key == "level")
        .map(|(_, value)| value.into_owned());
    let level = match from_query {
        Some(level) => level,
        None => match serde_json::from_slice::<LogLevelBody>(body) {
            Ok(parsed) => parsed.level,
            Err(_) => String::from_utf8_lossy(body).trim().to_string(),
        },
    };
    if level.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing log level");
    }
    match state.log_level.set_level(&level) {
        Ok(()) => {
            let level = serde_json::json!({ "level": state.log_level.level() });
            json_response(StatusCode::OK, &level)
        }
        Err(e) => pact_error_response(&e),
    }
}

fn handle_log_message(body: &Bytes) -> Response<Full<Bytes>> {
    let (level, message) = match serde_json::from_slice::<LogMessageBody>(body) {
        Ok(parsed) => (parsed.level.unwrap_or_else(|| "info".to_string()), parsed.message),
        Err(_) => ("info".to_string(), String::from_utf8_lossy(body).trim().to_string()),
    };
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing log message");
    }
    logging::emit(&level, &message);
    empty_response(StatusCode::NO_CONTENT)
}

async fn handle_list_pacts(state: &ControllerState) -> Response<Full<Bytes>> {
    let mut titles: BTreeMap<PactId, Vec<String>> = match state.load_pacts().await {
        Ok(pacts) => pacts
            .into_iter()
            .map(|(id, pact)| (id, pact.info.title))
            .collect(),
        Err(e) => {
            error!("Failed to list pacts: {}", e);
            return pact_error_response(&e);
        }
    };
    for pact in state.cached_pacts() {
        let pact = pact.lock();
        titles.insert(pact.id.clone(), pact.info.title.clone());
    }
    let entries: Vec<(Vec<String>, PactId)> = titles
        .into_iter()
        .map(|(id, title)| {
            let title = if title.is_empty() { vec![id.to_string()] } else { title };
            (title, id)
        })
        .collect();
    let tree = TitleTree::build(entries.iter().map(|(title, id)| (title.as_slice(), id.clone())));
    json_response(StatusCode::OK, &tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_params_from_query() {
        let query = "title=Inventory&title=create&mode=recording\
                     &recordingMode=refresh&strictMocking=false&clear";
        let params = SelectParams::parse(Some(query), &Bytes::new()).unwrap();
        assert_eq!(
            params.title.unwrap().into_segments(),
            vec!["Inventory", "create"]
        );
        assert_eq!(params.mode, Some(PactMode::Record));
        assert_eq!(params.recording_mode, Some(RecordingMode::Refresh));
        assert_eq!(params.strict_mocking, Some(false));
        assert_eq!(params.clear, Some(true));
    }

    #[test]
    fn test_select_params_body_wins() {
        let body = Bytes::from(r#"{"id": "from_body", "title": "single", "mode": "apply"}"#);
        let params = SelectParams::parse(Some("id=from_query&mode=record"), &body).unwrap();
        assert_eq!(params.id.as_deref(), Some("from_body"));
        assert_eq!(params.mode, Some(PactMode::Apply));
        assert_eq!(params.title.unwrap().into_segments(), vec!["single"]);
    }

    #[test]
    fn test_select_params_rejects_bad_values() {
        assert!(SelectParams::parse(Some("mode=sideways"), &Bytes::new()).is_err());
        assert!(SelectParams::parse(Some("clear=maybe"), &Bytes::new()).is_err());
        assert!(SelectParams::parse(None, &Bytes::from("{oops")).is_err());
    }

    #[test]
    fn test_project_fields() {
        let request = json!({"method": "GET", "url": "/a", "headers": {"Accept": "x"}});
        assert_eq!(project(&request, &[]), request);
        assert_eq!(
            project(&request, &["url".into(), "headers.accept".into(), "missing".into()]),
            json!({"url": "/a", "headers.accept": "x"})
        );
    }
}
