//! Per-URL analysis: AI scoring first, heuristic fallback second, an error record last.

use crate::heuristic::score_heuristically;
use crate::openai_compat::{OpenAiToneScorer, ScorerSettings};
use crate::proxy::ProxyChain;
use crate::sanitize::truncate_chars;
use futures_util::future::join_all;
use std::str::FromStr;
use std::sync::Arc;
use tonepipe_core::{
    AnalysisRequest, AnalysisResult, ApiKey, ContentFetcher, CredentialSource, Error, Result,
    ToneAnalysis, ToneScorer, MAX_BATCH_URLS,
};

/// `fullText` kept on fallback results (chars).
pub const FALLBACK_FULL_TEXT_CHARS: usize = 2_000;

/// Where the heuristic path gets its text from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackContent {
    /// Run fetch + sanitize again.
    #[default]
    Refetch,
    /// Reuse the AI path's text when its fetch succeeded.
    ReuseFirst,
}

impl FallbackContent {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackContent::Refetch => "refetch",
            FallbackContent::ReuseFirst => "reuse",
        }
    }
}

impl FromStr for FallbackContent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refetch" => Ok(FallbackContent::Refetch),
            "reuse" | "reuse-first" | "reuse_first" => Ok(FallbackContent::ReuseFirst),
            other => Err(Error::NotConfigured(format!(
                "unknown fallback content mode {other:?} (expected refetch or reuse)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub managed_credential: Option<ApiKey>,
    pub fallback_content: FallbackContent,
}

impl AnalyzerConfig {
    /// `TONEPIPE_MANAGED_API_KEY` and `TONEPIPE_FALLBACK_CONTENT`.
    pub fn from_env() -> Result<Self> {
        let fallback_content = match crate::env("TONEPIPE_FALLBACK_CONTENT") {
            Some(s) => s.parse()?,
            None => FallbackContent::default(),
        };
        Ok(Self {
            managed_credential: crate::env("TONEPIPE_MANAGED_API_KEY")
                .and_then(|s| ApiKey::managed(&s)),
            fallback_content,
        })
    }
}

#[derive(Clone)]
pub struct Analyzer {
    fetcher: Arc<dyn ContentFetcher>,
    scorer: Arc<dyn ToneScorer>,
    config: AnalyzerConfig,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("scorer", &self.scorer.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Analyzer {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        scorer: Arc<dyn ToneScorer>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            fetcher,
            scorer,
            config,
        }
    }

    /// Proxy chain and OpenAI-compatible scorer, both configured from the environment.
    pub fn local(config: AnalyzerConfig) -> Result<Self> {
        let client = crate::http_client_from_env()?;
        let fetcher = ProxyChain::from_env(client.clone())?;
        let scorer = OpenAiToneScorer::new(client, ScorerSettings::from_env());
        Ok(Self::new(Arc::new(fetcher), Arc::new(scorer), config))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn credential_for<'a>(&'a self, req: &'a AnalysisRequest) -> Option<&'a ApiKey> {
        match req.credential() {
            CredentialSource::User(key) => Some(key),
            CredentialSource::Managed => self.config.managed_credential.as_ref(),
        }
    }

    /// Fetch + AI score. On failure, hands back the fetched text (if any) with the error.
    async fn ai_path(
        &self,
        req: &AnalysisRequest,
    ) -> std::result::Result<ToneAnalysis, (Option<String>, Error)> {
        let Some(key) = self.credential_for(req) else {
            return Err((
                None,
                Error::NotConfigured("no API credential configured".to_string()),
            ));
        };
        let text = self
            .fetcher
            .fetch_text(req.url())
            .await
            .map_err(|e| (None, e))?;
        match self.scorer.score(Some(key), &text, req.url()).await {
            Ok(scored) => Ok(ToneAnalysis {
                profile: scored.profile,
                sample_size: text.chars().count(),
                full_text: text,
                token_usage: scored.token_usage,
            }),
            Err(e) => Err((Some(text), e)),
        }
    }

    async fn fallback_path(
        &self,
        req: &AnalysisRequest,
        first: Option<String>,
    ) -> Result<ToneAnalysis> {
        let text = match (self.config.fallback_content, first) {
            (FallbackContent::ReuseFirst, Some(text)) => text,
            _ => self.fetcher.fetch_text(req.url()).await?,
        };
        let profile = score_heuristically(&text);
        Ok(ToneAnalysis {
            profile,
            sample_size: text.chars().count(),
            full_text: truncate_chars(&text, FALLBACK_FULL_TEXT_CHARS).0,
            token_usage: None,
        })
    }

    /// Analyze one URL. Never fails: problems end up in the result's `error`.
    pub async fn analyze(&self, req: &AnalysisRequest) -> AnalysisResult {
        let (first_text, ai_error) = match self.ai_path(req).await {
            Ok(analysis) => {
                tracing::info!(url = req.url(), mode = "ai", "tone analysis complete");
                return AnalysisResult::ai(req, analysis);
            }
            Err(failure) => failure,
        };
        tracing::warn!(
            url = req.url(),
            scorer = self.scorer.name(),
            error = %ai_error,
            "AI analysis failed, using heuristic fallback"
        );

        match self.fallback_path(req, first_text).await {
            Ok(analysis) => {
                tracing::info!(url = req.url(), mode = "fallback", "tone analysis complete");
                AnalysisResult::fallback(req, analysis)
            }
            Err(fallback_error) => {
                // Without a credential the AI path never fetched; the fetch error says more.
                let message = match ai_error {
                    Error::NotConfigured(_) => fallback_error.to_string(),
                    other => other.to_string(),
                };
                tracing::warn!(
                    url = req.url(),
                    mode = "error",
                    error = %message,
                    "tone analysis failed"
                );
                AnalysisResult::failed(req, message)
            }
        }
    }

    /// Analyze up to [`MAX_BATCH_URLS`] requests concurrently, results in input order.
    pub async fn analyze_batch(&self, reqs: &[AnalysisRequest]) -> Result<Vec<AnalysisResult>> {
        if reqs.len() > MAX_BATCH_URLS {
            return Err(Error::InvalidInput(format!(
                "at most {MAX_BATCH_URLS} URLs per batch (got {})",
                reqs.len()
            )));
        }
        Ok(join_all(reqs.iter().map(|r| self.analyze(r))).await)
    }
}
