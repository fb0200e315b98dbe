//! State shared by every request a controller serves.

use super::client::HttpClient;
use super::mock::MockNotFoundResponder;
use crate::adapter::PactAdapter;
use crate::config::Config;
use crate::error::{PactError, Result};
use crate::logging::LogLevelControl;
use crate::matching::{DefaultUrlMatcher, RequestMatchingOptions};
use crate::pact::{Pact, PactId, PactMode, RecordingMode};
use crate::preprocessor::PactPreprocessor;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info};
use url::Url;

pub type SharedPact = Arc<Mutex<Pact>>;

/// Mode flags and the selected pact. Requests take a snapshot, so a request
/// in flight keeps working with the pact that was current when it arrived.
#[derive(Debug, Clone)]
pub struct Session {
    pub mode: PactMode,
    pub recording_mode: RecordingMode,
    /// Set by a select request; wins over the pact's and the configured value.
    pub strict_mocking: Option<bool>,
    pub current: Option<SharedPact>,
}

impl Session {
    /// Strict mocking in effect: the select override, else the current pact's
    /// setting, else `configured`.
    pub fn strict_mocking(&self, configured: bool) -> bool {
        self.strict_mocking
            .or_else(|| {
                self.current
                    .as_ref()
                    .and_then(|pact| pact.lock().info.strict_mocking)
            })
            .unwrap_or(configured)
    }
}

pub struct ControllerState {
    pub(crate) config: Config,
    pub(crate) base_url: Option<Url>,
    pub(crate) adapter: Arc<dyn PactAdapter>,
    pub(crate) preprocessor: Arc<dyn PactPreprocessor>,
    pub(crate) log_level: Arc<dyn LogLevelControl>,
    pub(crate) not_found_responder: Option<Arc<dyn MockNotFoundResponder>>,
    pub(crate) client: HttpClient,
    pub(crate) started_at: DateTime<Utc>,
    session: RwLock<Session>,
    /// Pacts selected during this run, including ones not yet persisted
    pacts: Mutex<HashMap<PactId, SharedPact>>,
    /// Scheduled saves per pact not yet written
    pending_saves: Arc<Mutex<HashMap<PactId, usize>>>,
    /// Serializes saves so files always hold the latest state
    persist_lock: Arc<Mutex<()>>,
}

impl ControllerState {
    pub(crate) fn new(
        config: Config,
        base_url: Option<Url>,
        adapter: Arc<dyn PactAdapter>,
        preprocessor: Arc<dyn PactPreprocessor>,
        log_level: Arc<dyn LogLevelControl>,
        not_found_responder: Option<Arc<dyn MockNotFoundResponder>>,
        client: HttpClient,
    ) -> Self {
        let session = Session {
            mode: config.mode,
            recording_mode: config.recording_mode,
            strict_mocking: None,
            current: None,
        };
        Self {
            config,
            base_url,
            adapter,
            preprocessor,
            log_level,
            not_found_responder,
            client,
            started_at: Utc::now(),
            session: RwLock::new(session),
            pacts: Mutex::new(HashMap::new()),
            pending_saves: Arc::new(Mutex::new(HashMap::new())),
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn resource_root(&self) -> &str {
        self.config.resource_root()
    }

    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    pub fn update_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.session.write())
    }

    /// Strict mocking in effect for `session`.
    pub fn strict_mocking(&self, session: &Session) -> bool {
        session.strict_mocking(self.config.strict_mocking)
    }

    /// The stored pact, reloaded so changes on disk are picked up. A cached
    /// pact with saves still pending, or one never saved, is used as is.
    /// `Ok(None)` when neither exists.
    pub async fn find_pact(&self, id: &PactId) -> Result<Option<SharedPact>> {
        if self.pending_saves.lock().contains_key(id) {
            debug!("Pact '{}' has pending saves, using the cached copy", id);
            return Ok(self.cached_pact(id));
        }
        let adapter = Arc::clone(&self.adapter);
        let lookup = id.clone();
        let loaded = tokio::task::spawn_blocking(move || adapter.load_pact(&lookup))
            .await
            .map_err(|e| blocking_error("load", id.as_str(), e))??;
        match loaded {
            Some(pact) => {
                debug!("Loaded pact '{}' with {} records", id, pact.len());
                Ok(Some(self.cache_pact(pact)))
            }
            None => Ok(self.cached_pact(id)),
        }
    }

    /// Every stored pact, read off the async runtime.
    pub async fn load_pacts(&self) -> Result<BTreeMap<PactId, Pact>> {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || adapter.load_pacts())
            .await
            .map_err(|e| blocking_error("list", "*", e))?
    }

    /// Delete the stored pact and forget the cached copy. Deselects it when
    /// it is the current pact.
    pub async fn delete_pact(&self, id: &PactId) -> Result<()> {
        let adapter = Arc::clone(&self.adapter);
        let target = id.clone();
        tokio::task::spawn_blocking(move || adapter.delete_pact(&target))
            .await
            .map_err(|e| blocking_error("delete", id.as_str(), e))??;
        self.pacts.lock().remove(id);
        self.update_session(|s| {
            if s.current.as_ref().is_some_and(|p| p.lock().id == *id) {
                s.current = None;
            }
        });
        info!("Removed pact '{}'", id);
        Ok(())
    }

    fn cached_pact(&self, id: &PactId) -> Option<SharedPact> {
        self.pacts.lock().get(id).cloned()
    }

    pub fn cache_pact(&self, pact: Pact) -> SharedPact {
        let id = pact.id.clone();
        let shared = Arc::new(Mutex::new(pact));
        self.pacts.lock().insert(id, Arc::clone(&shared));
        shared
    }

    pub fn cached_pacts(&self) -> Vec<SharedPact> {
        self.pacts.lock().values().cloned().collect()
    }

    /// URL matcher for lookups in `pact`: pact settings first, then the
    /// pact's recording base URL, then configuration.
    pub fn url_matcher_for(&self, pact: &Pact) -> DefaultUrlMatcher {
        let recorded_base = RequestMatchingOptions {
            ignore_url_parameters: None,
            base_url: pact.info.base_url.clone(),
        };
        let configured = self.config.effective_request_matching();
        DefaultUrlMatcher::from_options(&[
            pact.info.request_matching.as_ref(),
            Some(&recorded_base),
            Some(&configured),
        ])
    }

    /// Save `pact` in the background. Failures are logged, never returned.
    pub fn persist(&self, pact: &SharedPact) {
        let pact = Arc::clone(pact);
        let id = pact.lock().id.clone();
        *self.pending_saves.lock().entry(id.clone()).or_insert(0) += 1;

        let adapter = Arc::clone(&self.adapter);
        let persist_lock = Arc::clone(&self.persist_lock);
        let pending_saves = Arc::clone(&self.pending_saves);
        tokio::task::spawn_blocking(move || {
            {
                let _guard = persist_lock.lock();
                let snapshot = pact.lock().clone();
                if let Err(e) = adapter.save_pact(&snapshot) {
                    error!("Failed to save pact '{}': {}", snapshot.id, e);
                }
            }
            let mut pending = pending_saves.lock();
            if let Some(count) = pending.get_mut(&id) {
                *count -= 1;
                if *count == 0 {
                    pending.remove(&id);
                }
            }
        });
    }
}

fn blocking_error(operation: &'static str, id: &str, e: tokio::task::JoinError) -> PactError {
    PactError::adapter_io(operation, id, std::io::Error::other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pact::PactInfo;

    fn session_with(strict_mocking: Option<bool>, pact_setting: Option<bool>) -> Session {
        let mut info = PactInfo::with_title(["strict"]);
        info.strict_mocking = pact_setting;
        let id = PactId::from_title(&["strict"]);
        Session {
            mode: PactMode::Apply,
            recording_mode: RecordingMode::Append,
            strict_mocking,
            current: Some(Arc::new(Mutex::new(Pact::new(id, info)))),
        }
    }

    #[test]
    fn test_strict_mocking_precedence() {
        assert!(session_with(None, None).strict_mocking(true));
        assert!(!session_with(None, None).strict_mocking(false));
        assert!(!session_with(None, Some(false)).strict_mocking(true));
        assert!(session_with(Some(true), Some(false)).strict_mocking(false));
        assert!(!session_with(Some(false), Some(true)).strict_mocking(true));
    }

    #[test]
    fn test_strict_mocking_without_current_pact() {
        let mut session = session_with(None, Some(false));
        session.current = None;
        assert!(session.strict_mocking(true));
    }
}
