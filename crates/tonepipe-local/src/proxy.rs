//! Ordered proxy strategies for retrieving page content.
//!
//! Each strategy only knows how to turn a target URL into raw content. [`ProxyChain`]
//! sequences them: sanitize, require enough text, stop at the first success.

use crate::sanitize::sanitize;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tonepipe_core::{ContentFetcher, Error, FetchStrategy, Result};

/// Sanitized text shorter than this counts as a failed strategy.
pub const MIN_SANITIZED_CHARS: usize = 100;

/// Hard cap on bytes read from any single proxy response.
pub const DEFAULT_MAX_BYTES: usize = 5_000_000;

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const TONE_USER_AGENT: &str = "Mozilla/5.0 (compatible; ToneAnalyzer/1.0)";

pub const DEFAULT_ENVELOPE_ENDPOINT: &str = "https://api.allorigins.win/get?url=";
pub const DEFAULT_PASSTHROUGH_PREFIXES: [&str; 3] = [
    "https://corsproxy.io/?",
    "https://cors-anywhere.herokuapp.com/",
    "https://thingproxy.freeboard.io/fetch/",
];

async fn get_capped(
    client: &reqwest::Client,
    target: &str,
    accept: &str,
    user_agent: Option<&str>,
    max_bytes: usize,
) -> Result<Vec<u8>> {
    let mut rb = client.get(target).header(reqwest::header::ACCEPT, accept);
    if let Some(ua) = user_agent {
        rb = rb.header(reqwest::header::USER_AGENT, ua);
    }
    let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Fetch(format!("HTTP {}", status.as_u16())));
    }

    let mut bytes = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
        if bytes.len().saturating_add(chunk.len()) > max_bytes {
            let can_take = max_bytes.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..can_take]);
            break;
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Proxy that takes the target as a query parameter and answers with a JSON envelope
/// (`{"contents": "<html>..."}`), e.g. allorigins.
#[derive(Debug, Clone)]
pub struct EnvelopeProxy {
    client: reqwest::Client,
    endpoint: String,
    max_bytes: usize,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    contents: Option<String>,
}

impl EnvelopeProxy {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Cap on response bytes read (default [`DEFAULT_MAX_BYTES`]). A truncated envelope
    /// no longer parses and fails the strategy.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn request_url(&self, url: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        format!("{}{}", self.endpoint, encoded)
    }
}

#[async_trait::async_trait]
impl FetchStrategy for EnvelopeProxy {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_raw(&self, url: &str) -> Result<String> {
        let bytes = get_capped(
            &self.client,
            &self.request_url(url),
            "application/json",
            None,
            self.max_bytes,
        )
        .await?;
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Fetch(format!("invalid proxy envelope: {e}")))?;
        envelope
            .contents
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Fetch("no content returned".to_string()))
    }
}

/// Proxy that takes the target URL appended verbatim and answers with the page HTML,
/// e.g. corsproxy.io or thingproxy.
#[derive(Debug, Clone)]
pub struct PassthroughProxy {
    client: reqwest::Client,
    prefix: String,
    max_bytes: usize,
}

impl PassthroughProxy {
    pub fn new(client: reqwest::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait::async_trait]
impl FetchStrategy for PassthroughProxy {
    fn name(&self) -> &str {
        &self.prefix
    }

    async fn fetch_raw(&self, url: &str) -> Result<String> {
        let target = format!("{}{}", self.prefix, url);
        let bytes = get_capped(
            &self.client,
            &target,
            BROWSER_ACCEPT,
            Some(TONE_USER_AGENT),
            self.max_bytes,
        )
        .await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// No intermediary: fetch the page itself. Not part of the default chain.
#[derive(Debug, Clone)]
pub struct DirectFetch {
    client: reqwest::Client,
    max_bytes: usize,
}

impl DirectFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait::async_trait]
impl FetchStrategy for DirectFetch {
    fn name(&self) -> &str {
        "direct"
    }

    async fn fetch_raw(&self, url: &str) -> Result<String> {
        let bytes = get_capped(
            &self.client,
            url,
            BROWSER_ACCEPT,
            Some(TONE_USER_AGENT),
            self.max_bytes,
        )
        .await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Clone)]
pub struct ProxyChain {
    strategies: Vec<Arc<dyn FetchStrategy>>,
}

impl std::fmt::Debug for ProxyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyChain")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

impl ProxyChain {
    pub fn new(strategies: Vec<Arc<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// allorigins (envelope), then corsproxy.io, cors-anywhere and thingproxy (passthrough).
    pub fn default_chain(client: reqwest::Client) -> Self {
        let mut strategies: Vec<Arc<dyn FetchStrategy>> = vec![Arc::new(EnvelopeProxy::new(
            client.clone(),
            DEFAULT_ENVELOPE_ENDPOINT,
        ))];
        for prefix in DEFAULT_PASSTHROUGH_PREFIXES {
            strategies.push(Arc::new(PassthroughProxy::new(client.clone(), prefix)));
        }
        Self::new(strategies)
    }

    /// Parse a chain description: comma-separated `envelope=<endpoint>`,
    /// `passthrough=<prefix>` or `direct` entries, tried in the order given.
    pub fn from_list(client: reqwest::Client, list: &str) -> Result<Self> {
        let mut strategies: Vec<Arc<dyn FetchStrategy>> = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (kind, target) = match entry.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (entry, None),
            };
            match (kind, target) {
                ("direct", None) => strategies.push(Arc::new(DirectFetch::new(client.clone()))),
                ("envelope", Some(t)) if !t.is_empty() => {
                    strategies.push(Arc::new(EnvelopeProxy::new(client.clone(), t)))
                }
                ("passthrough", Some(t)) if !t.is_empty() => {
                    strategies.push(Arc::new(PassthroughProxy::new(client.clone(), t)))
                }
                _ => {
                    return Err(Error::NotConfigured(format!(
                        "invalid proxy strategy entry {entry:?} (expected envelope=<url>, passthrough=<url> or direct)"
                    )))
                }
            }
        }
        if strategies.is_empty() {
            return Err(Error::NotConfigured(
                "proxy strategy list is empty".to_string(),
            ));
        }
        Ok(Self::new(strategies))
    }

    /// `TONEPIPE_PROXIES` if set, else the default chain.
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        match crate::env("TONEPIPE_PROXIES") {
            Some(list) => Self::from_list(client, &list),
            None => Ok(Self::default_chain(client)),
        }
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    async fn attempt(strategy: &dyn FetchStrategy, url: &str) -> Result<String> {
        let raw = strategy.fetch_raw(url).await?;
        let text = sanitize(&raw);
        if text.chars().count() < MIN_SANITIZED_CHARS {
            return Err(Error::Fetch("insufficient content found".to_string()));
        }
        Ok(text)
    }

    /// Sanitized text from the first strategy that yields at least
    /// [`MIN_SANITIZED_CHARS`] characters.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut last_error: Option<Error> = None;
        for (i, strategy) in self.strategies.iter().enumerate() {
            match Self::attempt(strategy.as_ref(), url).await {
                Ok(text) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        index = i + 1,
                        url,
                        chars = text.chars().count(),
                        "proxy strategy succeeded"
                    );
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        index = i + 1,
                        url,
                        error = %e,
                        "proxy strategy failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let last = match last_error {
            Some(Error::Fetch(msg)) => msg,
            Some(other) => other.to_string(),
            None => "no strategies configured".to_string(),
        };
        Err(Error::Fetch(format!(
            "failed to fetch content from {url} using all {} proxy strategies; last error: {last}",
            self.strategies.len()
        )))
    }
}

#[async_trait::async_trait]
impl ContentFetcher for ProxyChain {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch(url).await
    }
}
