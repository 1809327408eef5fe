use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("scoring failed: {0}")]
    Scoring(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of URLs analyzed in one batch.
pub const MAX_BATCH_URLS: usize = 5;

/// Secret key for the scoring endpoint.
///
/// The value is never printed by `Debug`; use [`ApiKey::expose`] at the call site that
/// needs it (the Authorization header).
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub const USER_KEY_PREFIX: &'static str = "sk-";
    pub const USER_KEY_MIN_CHARS: usize = 40;

    /// Validate a user-supplied key: `sk-` prefix and at least 40 characters.
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim();
        if !s.starts_with(Self::USER_KEY_PREFIX) {
            return Err(Error::InvalidCredential(format!(
                "key must start with `{}`",
                Self::USER_KEY_PREFIX
            )));
        }
        if s.chars().count() < Self::USER_KEY_MIN_CHARS {
            return Err(Error::InvalidCredential(format!(
                "key must be at least {} characters",
                Self::USER_KEY_MIN_CHARS
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Wrap a managed (product) credential. Its format is opaque to the pipeline.
    pub fn managed(raw: &str) -> Option<Self> {
        let s = raw.trim();
        (!s.is_empty()).then(|| Self(s.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Where the scoring credential for a request comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CredentialSource {
    /// Use the managed credential from the analyzer configuration (if any).
    #[default]
    Managed,
    User(ApiKey),
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    url: url::Url,
    raw_url: String,
    label: Option<String>,
    credential: CredentialSource,
}

impl AnalysisRequest {
    /// Build a request for an absolute http/https URL. Blank labels count as absent.
    pub fn new(url: &str, label: Option<&str>) -> Result<Self> {
        let raw_url = url.trim().to_string();
        let parsed = url::Url::parse(&raw_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme `{}` (expected http or https)",
                parsed.scheme()
            )));
        }
        if parsed.host_str().map_or(true, |h| h.is_empty()) {
            return Err(Error::InvalidUrl(format!("missing host: {url}")));
        }
        let label = label
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(Self {
            url: parsed,
            raw_url,
            label,
            credential: CredentialSource::Managed,
        })
    }

    pub fn with_credential(mut self, credential: CredentialSource) -> Self {
        self.credential = credential;
        self
    }

    /// The URL exactly as the caller submitted it (trimmed).
    pub fn url(&self) -> &str {
        &self.raw_url
    }

    /// Explicit label, else the URL's host.
    pub fn label(&self) -> String {
        match &self.label {
            Some(l) => l.clone(),
            None => self.url.host_str().unwrap_or_default().to_string(),
        }
    }

    pub fn credential(&self) -> &CredentialSource {
        &self.credential
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Dimension {
    Formality,
    Seriousness,
    Enthusiasm,
    Respectfulness,
}

impl Dimension {
    /// Canonical order used everywhere a profile is laid out.
    pub const ALL: [Dimension; 4] = [
        Dimension::Formality,
        Dimension::Seriousness,
        Dimension::Enthusiasm,
        Dimension::Respectfulness,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Formality => "Formality",
            Dimension::Seriousness => "Seriousness",
            Dimension::Enthusiasm => "Enthusiasm",
            Dimension::Respectfulness => "Respectfulness",
        }
    }

    /// The five dominant-term labels, from the low end of the scale to the high end.
    pub fn labels(self) -> [&'static str; 5] {
        match self {
            Dimension::Formality => ["Very Casual", "Casual", "Neutral", "Formal", "Very Formal"],
            Dimension::Seriousness => [
                "Very Funny",
                "Funny",
                "Neutral",
                "Serious",
                "Very Serious",
            ],
            Dimension::Enthusiasm => [
                "Very Subdued",
                "Subdued",
                "Neutral",
                "Lively",
                "Very Lively",
            ],
            Dimension::Respectfulness => [
                "Irreverent",
                "Casual",
                "Neutral",
                "Respectful",
                "Very Respectful",
            ],
        }
    }

    fn index(self) -> usize {
        match self {
            Dimension::Formality => 0,
            Dimension::Seriousness => 1,
            Dimension::Enthusiasm => 2,
            Dimension::Respectfulness => 3,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Dimension::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidInput(format!("unknown tone dimension: {s:?}")))
    }
}

/// Bucket index for a score: `round(score / 100 * 4)`, computed in integers.
pub fn score_bucket(score: u8) -> usize {
    let s = u32::from(score.min(100));
    ((s * 4 + 50) / 100) as usize
}

pub fn dominant_term(dimension: Dimension, score: u8) -> &'static str {
    dimension.labels()[score_bucket(score)]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneDimension {
    pub dimension: Dimension,
    pub score: u8,
    pub dominant_term: &'static str,
}

impl ToneDimension {
    /// Clamp into [0, 100] (NaN counts as neutral 50), round, and derive the dominant term.
    pub fn new(dimension: Dimension, raw_score: f64) -> Self {
        let clamped = if raw_score.is_nan() {
            50.0
        } else {
            raw_score.clamp(0.0, 100.0)
        };
        let score = clamped.round() as u8;
        Self {
            dimension,
            score,
            dominant_term: dominant_term(dimension, score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysisItem {
    pub dimension: String,
    pub explanation: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingTip {
    pub tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandWord {
    pub word: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// The shape both scorers produce: exactly four dimensions in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneProfile {
    pub tone_dimensions: [ToneDimension; 4],
    pub detailed_analysis: Vec<DetailedAnalysisItem>,
    pub writing_tips: Vec<WritingTip>,
    pub brand_words: Vec<BrandWord>,
}

impl ToneProfile {
    /// Build the four dimensions from raw scores given in canonical order.
    pub fn dimensions_from_scores(scores: [f64; 4]) -> [ToneDimension; 4] {
        let mut i = 0;
        scores.map(|s| {
            let d = ToneDimension::new(Dimension::ALL[i], s);
            i += 1;
            d
        })
    }

    pub fn dimension(&self, dimension: Dimension) -> &ToneDimension {
        &self.tone_dimensions[dimension.index()]
    }
}

/// A scorer's output plus what the scoring call reported about itself.
#[derive(Debug, Clone)]
pub struct ScoredProfile {
    pub profile: ToneProfile,
    pub token_usage: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneAnalysis {
    #[serde(flatten)]
    pub profile: ToneProfile,
    pub full_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u64>,
    /// Length (chars) of the text the scorer actually saw.
    pub sample_size: usize,
}

impl ToneAnalysis {
    /// Rounded mean of the four dimension scores.
    pub fn average_score(&self) -> u8 {
        let sum: u32 = self
            .profile
            .tone_dimensions
            .iter()
            .map(|d| u32::from(d.score))
            .sum();
        ((f64::from(sum) / 4.0).round()) as u8
    }

    /// Dominant term of the most extreme dimension (furthest from 50; earlier wins ties).
    pub fn dominant_trait(&self) -> &'static str {
        let mut best = &self.profile.tone_dimensions[0];
        for d in &self.profile.tone_dimensions[1..] {
            if (i16::from(d.score) - 50).abs() > (i16::from(best.score) - 50).abs() {
                best = d;
            }
        }
        best.dominant_term
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Ai,
    Fallback,
    Error,
}

impl AnalysisMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMode::Ai => "ai",
            AnalysisMode::Fallback => "fallback",
            AnalysisMode::Error => "error",
        }
    }
}

/// One per request. Error results carry no tone data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    url: String,
    label: String,
    #[serde(flatten)]
    analysis: Option<ToneAnalysis>,
    analysis_mode: AnalysisMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AnalysisResult {
    pub fn ai(req: &AnalysisRequest, analysis: ToneAnalysis) -> Self {
        Self::scored(req, AnalysisMode::Ai, analysis)
    }

    pub fn fallback(req: &AnalysisRequest, analysis: ToneAnalysis) -> Self {
        Self::scored(req, AnalysisMode::Fallback, analysis)
    }

    fn scored(req: &AnalysisRequest, mode: AnalysisMode, analysis: ToneAnalysis) -> Self {
        Self {
            url: req.url().to_string(),
            label: req.label(),
            analysis: Some(analysis),
            analysis_mode: mode,
            error: None,
        }
    }

    pub fn failed(req: &AnalysisRequest, message: impl Into<String>) -> Self {
        Self {
            url: req.url().to_string(),
            label: req.label(),
            analysis: None,
            analysis_mode: AnalysisMode::Error,
            error: Some(message.into()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mode(&self) -> AnalysisMode {
        self.analysis_mode
    }

    pub fn analysis(&self) -> Option<&ToneAnalysis> {
        self.analysis.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// One network intermediary that can return a page's raw content.
#[async_trait::async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_raw(&self, url: &str) -> Result<String>;
}

/// Produces sanitized, analyzable text for a URL.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

#[async_trait::async_trait]
pub trait ToneScorer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn score(
        &self,
        credential: Option<&ApiKey>,
        text: &str,
        url: &str,
    ) -> Result<ScoredProfile>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_analysis(scores: [f64; 4]) -> ToneAnalysis {
        ToneAnalysis {
            profile: ToneProfile {
                tone_dimensions: ToneProfile::dimensions_from_scores(scores),
                detailed_analysis: vec![],
                writing_tips: vec![],
                brand_words: vec![],
            },
            full_text: "text".to_string(),
            token_usage: None,
            sample_size: 4,
        }
    }

    #[test]
    fn dominant_term_bucket_boundaries() {
        assert_eq!(dominant_term(Dimension::Formality, 0), "Very Casual");
        assert_eq!(dominant_term(Dimension::Formality, 50), "Neutral");
        assert_eq!(dominant_term(Dimension::Formality, 100), "Very Formal");
        assert_eq!(score_bucket(12), 0);
        assert_eq!(score_bucket(13), 1);
        assert_eq!(score_bucket(37), 1);
        assert_eq!(score_bucket(38), 2);
        assert_eq!(score_bucket(62), 2);
        assert_eq!(score_bucket(63), 3);
        assert_eq!(score_bucket(87), 3);
        assert_eq!(score_bucket(88), 4);
        assert_eq!(dominant_term(Dimension::Respectfulness, 0), "Irreverent");
        assert_eq!(dominant_term(Dimension::Enthusiasm, 75), "Lively");
    }

    #[test]
    fn tone_dimension_clamps_and_treats_nan_as_neutral() {
        assert_eq!(ToneDimension::new(Dimension::Seriousness, -40.0).score, 0);
        assert_eq!(ToneDimension::new(Dimension::Seriousness, 1e9).score, 100);
        let nan = ToneDimension::new(Dimension::Seriousness, f64::NAN);
        assert_eq!(nan.score, 50);
        assert_eq!(nan.dominant_term, "Neutral");
        assert_eq!(ToneDimension::new(Dimension::Seriousness, 62.5).score, 63);
    }

    #[test]
    fn dimension_parses_case_insensitively_and_rejects_unknown() {
        assert_eq!(
            "respectfulness".parse::<Dimension>().unwrap(),
            Dimension::Respectfulness
        );
        assert!("Humor".parse::<Dimension>().is_err());
    }

    #[test]
    fn request_rejects_non_http_urls_and_defaults_label_to_host() {
        assert!(matches!(
            AnalysisRequest::new("ftp://example.com/x", None),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            AnalysisRequest::new("example.com", None),
            Err(Error::InvalidUrl(_))
        ));
        let r = AnalysisRequest::new("https://www.example.com/about", Some("   ")).unwrap();
        assert_eq!(r.label(), "www.example.com");
        let r = AnalysisRequest::new("https://example.com/", Some(" Acme ")).unwrap();
        assert_eq!(r.label(), "Acme");
    }

    #[test]
    fn api_key_format_and_redaction() {
        assert!(ApiKey::parse("pk-0123456789012345678901234567890123456789").is_err());
        assert!(ApiKey::parse("sk-short").is_err());
        let k = ApiKey::parse("  sk-0123456789012345678901234567890123456  ").unwrap();
        assert!(k.expose().starts_with("sk-"));
        assert!(!format!("{k:?}").contains("0123"));
        assert!(ApiKey::managed("  ").is_none());
    }

    #[test]
    fn error_result_serializes_without_tone_fields() {
        let req = AnalysisRequest::new("https://example.com/", None).unwrap();
        let r = AnalysisResult::failed(&req, "fetch failed: boom");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["analysisMode"], "error");
        assert_eq!(v["label"], "example.com");
        assert_eq!(v["error"], "fetch failed: boom");
        assert!(v.get("toneDimensions").is_none());
        assert!(v.get("fullText").is_none());
    }

    #[test]
    fn scored_result_serializes_flat_camel_case() {
        let req = AnalysisRequest::new("https://example.com/", Some("Ex")).unwrap();
        let r = AnalysisResult::fallback(&req, sample_analysis([10.0, 50.0, 90.0, 70.0]));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["analysisMode"], "fallback");
        let dims = v["toneDimensions"].as_array().unwrap();
        assert_eq!(dims.len(), 4);
        assert_eq!(dims[0]["dimension"], "Formality");
        assert_eq!(dims[0]["dominantTerm"], "Very Casual");
        assert_eq!(v["sampleSize"], 4);
        assert!(v.get("error").is_none());
        assert!(v.get("tokenUsage").is_none());
    }

    #[test]
    fn comparison_helpers() {
        let a = sample_analysis([50.0, 45.0, 95.0, 10.0]);
        assert_eq!(a.dominant_trait(), "Very Lively");
        assert_eq!(a.average_score(), 50);
        let tie = sample_analysis([20.0, 80.0, 50.0, 50.0]);
        assert_eq!(tie.dominant_trait(), "Casual");
    }

    proptest! {
        #[test]
        fn tone_dimension_score_is_always_in_range(raw in any::<f64>()) {
            for d in Dimension::ALL {
                let t = ToneDimension::new(d, raw);
                prop_assert!(t.score <= 100);
                prop_assert_eq!(t.dominant_term, dominant_term(d, t.score));
            }
        }

        #[test]
        fn dominant_term_is_pure(score in 0u8..=100) {
            for d in Dimension::ALL {
                prop_assert_eq!(dominant_term(d, score), dominant_term(d, score));
                prop_assert!(d.labels().contains(&dominant_term(d, score)));
            }
        }
    }
}
