use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::InferenceError;
use crate::state::{ConnectivityStatus, EndpointConfig};

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

struct ProbeTicket {
    generation: u64,
    url: String,
    timeout: Duration,
}

/// Client for a local Ollama server.
///
/// Owns the endpoint configuration and the connectivity status. Cloning is
/// cheap and every clone shares the same configuration and status.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    config: Arc<watch::Sender<EndpointConfig>>,
    status: Arc<watch::Sender<ConnectivityStatus>>,
    probe_generation: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl OllamaClient {
    /// Creates the client and immediately starts a connectivity probe.
    ///
    /// Must be called from within a tokio runtime for the probe to run.
    pub fn new(config: EndpointConfig) -> Self {
        let (config, _) = watch::channel(config);
        let (status, _) = watch::channel(ConnectivityStatus::Connecting);
        let client = Self {
            client: Client::new(),
            config: Arc::new(config),
            status: Arc::new(status),
            probe_generation: Arc::new(AtomicU64::new(0)),
            shutdown: CancellationToken::new(),
        };
        client.check_connectivity();
        client
    }

    pub fn observe_connectivity(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status.subscribe()
    }

    pub fn connectivity(&self) -> ConnectivityStatus {
        *self.status.borrow()
    }

    pub fn observe_config(&self) -> watch::Receiver<EndpointConfig> {
        self.config.subscribe()
    }

    /// Fire-and-forget probe. The outcome is only visible through
    /// [`observe_connectivity`](Self::observe_connectivity).
    ///
    /// Does nothing after [`shutdown`](Self::shutdown) or outside a runtime,
    /// leaving the status as it was.
    pub fn check_connectivity(&self) {
        if self.shutdown.is_cancelled() {
            debug!("client shut down, connectivity probe skipped");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, connectivity probe skipped");
            return;
        };

        let ticket = self.begin_probe();
        let this = self.clone();
        let shutdown = self.shutdown.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = this.run_probe(ticket) => {}
            }
        });
    }

    /// Probe the server and wait for the outcome.
    pub async fn probe(&self) -> ConnectivityStatus {
        let ticket = self.begin_probe();
        self.run_probe(ticket).await
    }

    /// Marks the status as connecting and pins the endpoint the probe targets.
    fn begin_probe(&self) -> ProbeTicket {
        self.status.send_replace(ConnectivityStatus::Connecting);
        let (url, timeout) = self.endpoint("api/tags");
        ProbeTicket {
            generation: self.probe_generation.fetch_add(1, Ordering::SeqCst) + 1,
            url,
            timeout,
        }
    }

    async fn run_probe(&self, ticket: ProbeTicket) -> ConnectivityStatus {
        let ProbeTicket { generation, url, timeout } = ticket;

        let outcome = match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) if response.status() == StatusCode::OK => ConnectivityStatus::Connected,
            Ok(response) => {
                warn!(%url, status = %response.status(), "connectivity probe rejected");
                ConnectivityStatus::Disconnected
            }
            Err(err) => {
                warn!(%url, error = %err, "connectivity probe failed");
                ConnectivityStatus::Disconnected
            }
        };

        // A newer probe (e.g. after set_url) owns the status now
        if self.probe_generation.load(Ordering::SeqCst) == generation {
            info!(%url, status = outcome.label(), "connectivity updated");
            self.status.send_replace(outcome);
        } else {
            debug!(%url, "discarding stale probe result");
        }
        outcome
    }

    /// Single non-streaming generation. `model` defaults to the selected model.
    pub async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String, InferenceError> {
        let (url, timeout) = self.endpoint("api/generate");
        let model = model
            .map(str::to_string)
            .unwrap_or_else(|| self.get_current_model());

        let request = OllamaRequest {
            model: &model,
            prompt,
            stream: false,
        };

        debug!(%url, %model, prompt_len = prompt.len(), "sending generate request");
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                warn!(%url, error = %err, "generate request failed");
                InferenceError::from_transport(&err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%url, %status, %model, "generate request rejected");
            return Err(InferenceError::from_status(status, &model, &url, &body));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|err| InferenceError::from_transport(&err))?;
        debug!(
            %model,
            eval_count = ?ollama_response.eval_count,
            total_duration = ?ollama_response.total_duration,
            "generate request completed"
        );
        Ok(ollama_response.response)
    }

    /// Names of the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let (url, timeout) = self.endpoint("api/tags");

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| InferenceError::from_transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::from_status(status, &self.get_current_model(), &url, &body));
        }

        let models_response: OllamaModelsResponse = response
            .json()
            .await
            .map_err(|err| InferenceError::from_transport(&err))?;
        Ok(models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect())
    }

    pub fn get_current_model(&self) -> String {
        self.config.borrow().model.clone()
    }

    pub fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        info!(%model, "model selected");
        self.config.send_modify(|config| config.model = model);
    }

    pub fn get_url(&self) -> String {
        self.config.borrow().base_url.clone()
    }

    /// Points the client at a new server and re-probes it.
    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        info!(%url, "endpoint changed");
        self.config.send_modify(|config| config.base_url = url);
        self.check_connectivity();
    }

    /// Cancels outstanding connectivity probes. Later probes are not started.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn endpoint(&self, path: &str) -> (String, Duration) {
        let config = self.config.borrow();
        let base = config.base_url.trim_end_matches('/');
        (format!("{}/{}", base, path), config.timeout)
    }
}
