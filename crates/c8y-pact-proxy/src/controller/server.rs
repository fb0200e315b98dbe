//! Controller construction and lifecycle.

use super::client::create_http_client;
use super::mock::MockNotFoundResponder;
use super::router::route_request;
use super::state::{ControllerState, Session};
use crate::adapter::{FileAdapter, PactAdapter};
use crate::config::Config;
use crate::logging::{LogLevelControl, StaticLogLevel};
use crate::pact::{Pact, PactId};
use crate::preprocessor::{DefaultPreprocessor, PactPreprocessor, PreprocessorOptions};
use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

/// Builds a [`Controller`] with optional replacements for its strategies.
pub struct ControllerBuilder {
    config: Config,
    adapter: Option<Arc<dyn PactAdapter>>,
    preprocessor: Option<Arc<dyn PactPreprocessor>>,
    env_preprocessor: Option<PreprocessorOptions>,
    log_level: Option<Arc<dyn LogLevelControl>>,
    not_found_responder: Option<Arc<dyn MockNotFoundResponder>>,
}

impl ControllerBuilder {
    pub fn adapter(mut self, adapter: Arc<dyn PactAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn preprocessor(mut self, preprocessor: Arc<dyn PactPreprocessor>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// Preprocessor options from the environment, layered between call-time
    /// options and the configured `preprocessor` block. Ignored when a
    /// custom preprocessor is set.
    pub fn env_preprocessor(mut self, options: PreprocessorOptions) -> Self {
        self.env_preprocessor = Some(options);
        self
    }

    pub fn log_level(mut self, log_level: Arc<dyn LogLevelControl>) -> Self {
        self.log_level = Some(log_level);
        self
    }

    pub fn not_found_responder(mut self, responder: Arc<dyn MockNotFoundResponder>) -> Self {
        self.not_found_responder = Some(responder);
        self
    }

    pub fn build(self) -> anyhow::Result<Controller> {
        self.config.validate()?;
        let base_url = self
            .config
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("Invalid baseUrl")?;
        let adapter = self
            .adapter
            .unwrap_or_else(|| Arc::new(FileAdapter::new(self.config.folder.clone())));
        let preprocessor = self.preprocessor.unwrap_or_else(|| {
            Arc::new(
                DefaultPreprocessor::new(self.config.preprocessor.clone())
                    .with_env_defaults(self.env_preprocessor),
            )
        });
        let log_level = self
            .log_level
            .unwrap_or_else(|| Arc::new(StaticLogLevel::new(&self.config.log_level)));
        let client = create_http_client(self.config.tls_skip_verify);

        let state = ControllerState::new(
            self.config,
            base_url,
            adapter,
            preprocessor,
            log_level,
            self.not_found_responder,
            client,
        );
        Ok(Controller {
            state: Arc::new(state),
        })
    }
}

/// Record/replay controller. Owns its state; several controllers can run in
/// one process.
pub struct Controller {
    state: Arc<ControllerState>,
}

impl Controller {
    pub fn builder(config: Config) -> ControllerBuilder {
        ControllerBuilder {
            config,
            adapter: None,
            preprocessor: None,
            env_preprocessor: None,
            log_level: None,
            not_found_responder: None,
        }
    }

    /// Controller with the file adapter and default preprocessor.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::builder(config).build()
    }

    pub fn session(&self) -> Session {
        self.state.session()
    }

    /// Select `pact` as the current pact without going through the admin API.
    pub fn select(&self, pact: Pact) -> PactId {
        let id = pact.id.clone();
        let shared = self.state.cache_pact(pact);
        self.state.update_session(|s| s.current = Some(shared));
        id
    }

    /// Bind the configured address and serve until [`ControllerHandle::stop`].
    pub async fn start(self) -> anyhow::Result<ControllerHandle> {
        let addr = self.state.config.listen.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        let local_addr = listener.local_addr()?;
        info!(
            "c8yctrl listening on http://{} (admin at {}, mode {})",
            local_addr,
            self.state.resource_root(),
            self.state.session().mode
        );
        match &self.state.base_url {
            Some(base_url) => info!("Forwarding to {}", base_url),
            None => info!("No baseUrl configured, unmatched requests cannot be proxied"),
        }

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let state = Arc::clone(&state);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        route_request(req, Arc::clone(&state))
                                    });
                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error: {}", e);
                                    }
                                });
                            }
                            Err(e) => error!("Accept error on {}: {}", local_addr, e),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("c8yctrl on {} shutting down", local_addr);
                        break;
                    }
                }
            }
        });

        Ok(ControllerHandle {
            local_addr,
            shutdown_tx,
            task,
            state: self.state,
        })
    }
}

/// Running controller.
pub struct ControllerHandle {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
    state: Arc<ControllerState>,
}

impl ControllerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://host:port` of the listener.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn session(&self) -> Session {
        self.state.session()
    }

    /// Delete a stored pact and drop this controller's copy of it.
    pub async fn delete_pact(&self, id: &PactId) -> crate::Result<()> {
        self.state.delete_pact(id).await
    }

    /// Stop accepting connections and wait for the accept loop to end.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Controller task failed: {}", e);
        }
    }
}
