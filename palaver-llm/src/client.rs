//! Inference proxy client — off-thread requests with channel delivery.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use palaver_core::config::{ProxyConfig, ProxyMode};
use palaver_core::history::Utterance;
use palaver_core::types::EntityId;
use reqwest::Client;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::resolve::resolve_body;
use crate::stats::{ProxyStats, ProxyStatsSnapshot};
use crate::types::{Completion, ProxyRequest, RequestSettings};

/// A scripted exchange: request in, raw body (or fault) out.
pub type ScriptFn = dyn Fn(&ProxyRequest) -> Result<String, ProxyError> + Send + Sync;

/// How requests reach the proxy.
#[derive(Clone)]
pub enum ProxyTransport {
    /// POST JSON to `url` with a per-request timeout.
    Http {
        /// Shared connection pool.
        client: Client,
        /// Proxy endpoint.
        url: String,
        /// Round-trip bound.
        timeout: Duration,
    },
    /// No proxy — every call resolves to an empty answer.
    Offline,
    /// In-process responder, for tests and local tooling.
    Scripted(Arc<ScriptFn>),
}

impl fmt::Debug for ProxyTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { url, timeout, .. } => f
                .debug_struct("Http")
                .field("url", url)
                .field("timeout", timeout)
                .finish_non_exhaustive(),
            Self::Offline => f.write_str("Offline"),
            Self::Scripted(_) => f.write_str("Scripted"),
        }
    }
}

impl ProxyTransport {
    /// Transport selected by configuration.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        match config.mode {
            ProxyMode::Offline => Self::Offline,
            ProxyMode::Http => Self::Http {
                client: Client::new(),
                url: config.url.clone(),
                timeout: Duration::from_millis(config.request_timeout_ms),
            },
        }
    }

    /// Wrap a closure as a scripted transport.
    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(&ProxyRequest) -> Result<String, ProxyError> + Send + Sync + 'static,
    {
        Self::Scripted(Arc::new(script))
    }

    /// Perform one exchange and return the raw response body.
    ///
    /// Non-success statuses still return their body: an error payload from
    /// the proxy resolves to an empty answer like any other error shape.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError`] on transport faults, timeouts, or when offline.
    pub async fn send(&self, request: &ProxyRequest) -> Result<String, ProxyError> {
        match self {
            Self::Offline => Err(ProxyError::Unavailable("proxy is offline".into())),
            Self::Scripted(script) => script(request),
            Self::Http { client, url, timeout } => {
                let response = client
                    .post(url)
                    .json(request)
                    .timeout(*timeout)
                    .send()
                    .await
                    .map_err(|e| classify(e, *timeout))?;
                let status = response.status();
                let body = response.text().await.map_err(|e| classify(e, *timeout))?;
                if !status.is_success() {
                    warn!(%status, "Proxy returned non-success status");
                }
                Ok(body)
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn classify(err: reqwest::Error, timeout: Duration) -> ProxyError {
    if err.is_timeout() {
        ProxyError::Timeout(timeout.as_millis() as u64)
    } else {
        err.into()
    }
}

/// Sends prompts to the proxy and delivers exactly one [`Completion`] per call.
///
/// `T` is the caller's continuation token. The client never inspects it; it
/// is handed back untouched alongside the answer so the receiver can decide
/// whether the originating conversation still exists.
pub struct AiProxyClient<T> {
    transport: ProxyTransport,
    settings: Arc<RequestSettings>,
    runtime: Handle,
    completions: mpsc::UnboundedSender<Completion<T>>,
    stats: ProxyStats,
}

impl<T> Clone for AiProxyClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            settings: Arc::clone(&self.settings),
            runtime: self.runtime.clone(),
            completions: self.completions.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<T> fmt::Debug for AiProxyClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiProxyClient")
            .field("transport", &self.transport)
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> AiProxyClient<T> {
    /// Create a client from configuration, spawning work on `runtime`.
    ///
    /// Returns the client and the receiving end of its completion channel.
    #[must_use]
    pub fn new(config: &ProxyConfig, runtime: Handle) -> (Self, mpsc::UnboundedReceiver<Completion<T>>) {
        let settings = RequestSettings::from_config(config);
        info!(model = %settings.model, url = %config.url, mode = ?config.mode, "Proxy client configured");
        if settings.system_prompt.is_empty() {
            warn!("system_prompt is blank, the proxy may reject requests");
        }
        Self::with_transport(ProxyTransport::from_config(config), settings, runtime)
    }

    /// Create a client over an explicit transport.
    #[must_use]
    pub fn with_transport(
        transport: ProxyTransport,
        settings: RequestSettings,
        runtime: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<Completion<T>>) {
        let (completions, rx) = mpsc::unbounded_channel();
        let client = Self {
            transport,
            settings: Arc::new(settings),
            runtime,
            completions,
            stats: ProxyStats::new(),
        };
        (client, rx)
    }

    /// Ask with the configured default system prompt.
    pub fn ask(&self, identity: Option<EntityId>, history: &[Utterance], prompt: &str, token: T) {
        let request = ProxyRequest::build(&self.settings, &self.settings.system_prompt, history, prompt);
        self.submit(identity, request, token);
    }

    /// Ask with a per-call system prompt.
    pub fn ask_with_system(
        &self,
        identity: Option<EntityId>,
        history: &[Utterance],
        prompt: &str,
        system: &str,
        token: T,
    ) {
        let request = ProxyRequest::build(&self.settings, system, history, prompt);
        self.submit(identity, request, token);
    }

    fn submit(&self, identity: Option<EntityId>, request: ProxyRequest, token: T) {
        self.stats.record_submit();
        let transport = self.transport.clone();
        let completions = self.completions.clone();
        let stats = self.stats.clone();

        self.runtime.spawn(async move {
            let answer = exchange(&transport, &request, &stats).await;
            if completions.send(Completion { identity, answer, token }).is_err() {
                debug!("Completion receiver dropped, answer discarded");
            }
        });
    }

    /// Current traffic counters.
    #[must_use]
    pub fn stats(&self) -> ProxyStatsSnapshot {
        self.stats.snapshot()
    }

    /// The request parameters in use.
    #[must_use]
    pub fn settings(&self) -> &RequestSettings {
        &self.settings
    }
}

/// One full round trip: send, resolve, and fold every fault into `""`.
#[allow(clippy::cast_possible_truncation)]
pub async fn exchange(transport: &ProxyTransport, request: &ProxyRequest, stats: &ProxyStats) -> String {
    let start = Instant::now();
    if let Ok(body) = serde_json::to_string(request) {
        debug!(body = %body, "\u{25b6} proxy request");
    }

    let result = transport.send(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(raw) => {
            debug!(body = %raw, latency_ms, "\u{25c0} proxy response");
            let answer = resolve_body(&raw);
            stats.record_outcome(!answer.is_empty(), false, latency_ms);
            answer
        }
        Err(ProxyError::Unavailable(reason)) => {
            debug!(%reason, "Proxy offline, staying silent");
            stats.record_outcome(false, true, latency_ms);
            String::new()
        }
        Err(e) => {
            warn!(error = %e, latency_ms, "AI proxy failed");
            stats.record_outcome(false, true, latency_ms);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::history::Role;
    use parking_lot::Mutex;

    fn settings() -> RequestSettings {
        RequestSettings {
            model: "test-model".into(),
            system_prompt: "default system".into(),
            temperature: 0.5,
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn ask_delivers_resolved_answer() {
        let transport = ProxyTransport::scripted(|_| Ok(r#"{"answer":"Hello, traveler"}"#.to_string()));
        let (client, mut rx) = AiProxyClient::with_transport(transport, settings(), Handle::current());
        let player = EntityId::new();

        client.ask(Some(player), &[], "hi", 7u32);
        let done = rx.recv().await.expect("completion");
        assert_eq!(done.answer, "Hello, traveler");
        assert_eq!(done.identity, Some(player));
        assert_eq!(done.token, 7);
    }

    #[tokio::test]
    async fn faults_become_empty_answers() {
        let transport = ProxyTransport::scripted(|_| Err(ProxyError::Timeout(10_000)));
        let (client, mut rx) = AiProxyClient::with_transport(transport, settings(), Handle::current());

        client.ask(None, &[], "hi", ());
        let done = rx.recv().await.expect("completion");
        assert_eq!(done.answer, "");
        assert_eq!(client.stats().failed, 1);
    }

    #[tokio::test]
    async fn offline_is_silent() {
        let (client, mut rx) =
            AiProxyClient::with_transport(ProxyTransport::Offline, settings(), Handle::current());
        client.ask(None, &[], "hi", ());
        assert_eq!(rx.recv().await.expect("completion").answer, "");
    }

    #[tokio::test]
    async fn connect_failure_is_a_fault() {
        let transport = ProxyTransport::Http {
            client: Client::new(),
            url: "http://127.0.0.1:9/ai".into(),
            timeout: Duration::from_secs(2),
        };
        let request = ProxyRequest::build(&settings(), "", &[], "hi");
        let err = transport.send(&request).await.expect_err("nothing listens on port 9");
        assert!(matches!(err, ProxyError::Connect(_) | ProxyError::Timeout(_)), "got {err:?}");

        let (client, mut rx) = AiProxyClient::with_transport(transport, settings(), Handle::current());
        client.ask(None, &[], "hi", ());
        assert_eq!(rx.recv().await.expect("completion").answer, "");
        assert_eq!(client.stats().failed, 1);
    }

    #[tokio::test]
    async fn offline_mode_from_config() {
        let config = ProxyConfig {
            mode: ProxyMode::Offline,
            system_prompt: "You are helpful.".into(),
            ..ProxyConfig::default()
        };
        let (client, mut rx) = AiProxyClient::new(&config, Handle::current());
        assert_eq!(client.settings().system_prompt, "You are helpful.");
        client.ask(None, &[], "hi", ());
        assert_eq!(rx.recv().await.expect("completion").answer, "");
        assert_eq!(client.stats().submitted, 1);
    }

    #[tokio::test]
    async fn system_override_and_history_reach_the_wire() {
        let seen: Arc<Mutex<Vec<ProxyRequest>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let transport = ProxyTransport::scripted(move |req| {
            sink.lock().push(req.clone());
            Ok("{}".to_string())
        });
        let (client, mut rx) = AiProxyClient::with_transport(transport, settings(), Handle::current());

        let history = vec![Utterance::new(Role::Assistant, "welcome back")];
        client.ask_with_system(None, &history, "any news?", "You are Mira.", ());
        client.ask(None, &[], "plain", ());
        rx.recv().await.expect("first");
        rx.recv().await.expect("second");

        let seen = seen.lock();
        let overridden = seen.iter().find(|r| r.prompt() == "any news?").expect("override request");
        assert_eq!(overridden.system, "You are Mira.");
        assert_eq!(overridden.messages.len(), 2);
        assert_eq!(overridden.messages[0].role, "assistant");
        let plain = seen.iter().find(|r| r.prompt() == "plain").expect("plain request");
        assert_eq!(plain.system, "default system");
    }
}
