use std::time::Duration;
use tonepipe_core::{Error, Result};

pub mod export;
pub mod heuristic;
pub mod openai_compat;
pub mod pipeline;
pub mod proxy;
pub mod sanitize;

pub use export::CsvExport;
pub use heuristic::score_heuristically;
pub use openai_compat::{OpenAiToneScorer, ScorerSettings};
pub use pipeline::{Analyzer, AnalyzerConfig, FallbackContent};
pub use proxy::{DirectFetch, EnvelopeProxy, PassthroughProxy, ProxyChain};
pub use sanitize::sanitize;

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    env(key).and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// Shared reqwest client for proxy strategies and the scoring endpoint.
///
/// Connect and total timeouts keep a stalled intermediary from hanging a pipeline forever;
/// per-request timeouts (the scorer's) can still override the total.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("tonepipe-local/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}

/// [`http_client`] with the total timeout from `TONEPIPE_HTTP_TIMEOUT_MS`.
pub fn http_client_from_env() -> Result<reqwest::Client> {
    http_client(Duration::from_millis(env_u64(
        "TONEPIPE_HTTP_TIMEOUT_MS",
        DEFAULT_HTTP_TIMEOUT_MS,
    )))
}
