//! Splits incoming traffic between the admin interface and the
//! mock/proxy pipeline.

use super::state::ControllerState;
use super::{admin, traffic};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Parsed route below the resource root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerRoute {
    /// HEAD/GET {root}
    Root,
    /// GET {root}/status
    Status,
    /// GET/POST/DELETE {root}/current
    Current,
    /// POST {root}/current/clear
    CurrentClear,
    /// GET {root}/current/request
    CurrentRequest,
    /// GET {root}/current/response
    CurrentResponse,
    /// GET/PUT/POST {root}/log
    Log,
    /// GET {root}/pacts
    Pacts,
}

impl ControllerRoute {
    /// Parse route from path segments after the resource root
    fn parse(segments: &[&str]) -> Option<Self> {
        match segments {
            [] => Some(ControllerRoute::Root),
            ["status"] => Some(ControllerRoute::Status),
            ["current"] => Some(ControllerRoute::Current),
            ["current", "clear"] => Some(ControllerRoute::CurrentClear),
            ["current", "request"] => Some(ControllerRoute::CurrentRequest),
            ["current", "response"] => Some(ControllerRoute::CurrentResponse),
            ["log"] => Some(ControllerRoute::Log),
            ["pacts"] => Some(ControllerRoute::Pacts),
            _ => None,
        }
    }

    /// `None` when `path` is not below `root`, `Some(None)` for an unknown
    /// admin path.
    pub fn match_path(root: &str, path: &str) -> Option<Option<Self>> {
        let rest = path.strip_prefix(root)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        Some(Self::parse(&segments))
    }
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    state: Arc<ControllerState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let response = match ControllerRoute::match_path(state.resource_root(), &path) {
        Some(route) => {
            debug!("Admin: {} {}", req.method(), path);
            admin::handle(route, req, state).await
        }
        None => traffic::handle(req, state).await,
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_path() {
        let root = "/c8yctrl";
        assert_eq!(
            ControllerRoute::match_path(root, "/c8yctrl"),
            Some(Some(ControllerRoute::Root))
        );
        assert_eq!(
            ControllerRoute::match_path(root, "/c8yctrl/"),
            Some(Some(ControllerRoute::Root))
        );
        assert_eq!(
            ControllerRoute::match_path(root, "/c8yctrl/current/clear"),
            Some(Some(ControllerRoute::CurrentClear))
        );
        assert_eq!(
            ControllerRoute::match_path(root, "/c8yctrl/current/response"),
            Some(Some(ControllerRoute::CurrentResponse))
        );
        assert_eq!(ControllerRoute::match_path(root, "/c8yctrl/unknown"), Some(None));
        assert_eq!(ControllerRoute::match_path(root, "/c8yctrlx/status"), None);
        assert_eq!(ControllerRoute::match_path(root, "/inventory/managedObjects"), None);
    }
}
