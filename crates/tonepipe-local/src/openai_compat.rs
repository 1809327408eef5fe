use serde::{Deserialize, Serialize};
use tonepipe_core::{
    ApiKey, BrandWord, DetailedAnalysisItem, Dimension, Error, Result, ScoredProfile,
    ToneDimension, ToneProfile, ToneScorer, WritingTip,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MAX_TOKENS: u64 = 2_000;
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 60_000;

const SYSTEM_PROMPT: &str = "You are an expert brand tone analyst. Analyze website content \
using Nielsen Norman methodology and return only valid JSON.";

const RESPONSE_SHAPE: &str = r#"{
  "toneDimensions": [
    {"dimension": "Formality", "score": 0-100, "dominantTerm": "Very Casual|Casual|Neutral|Formal|Very Formal"},
    {"dimension": "Seriousness", "score": 0-100, "dominantTerm": "Very Funny|Funny|Neutral|Serious|Very Serious"},
    {"dimension": "Enthusiasm", "score": 0-100, "dominantTerm": "Very Subdued|Subdued|Neutral|Lively|Very Lively"},
    {"dimension": "Respectfulness", "score": 0-100, "dominantTerm": "Irreverent|Casual|Neutral|Respectful|Very Respectful"}
  ],
  "detailedAnalysis": [
    {"dimension": "Formality Analysis", "explanation": "detailed explanation of formality score", "examples": ["quote1", "quote2"]},
    {"dimension": "Seriousness Analysis", "explanation": "detailed explanation of seriousness score", "examples": ["quote1", "quote2"]},
    {"dimension": "Enthusiasm Analysis", "explanation": "detailed explanation of enthusiasm score", "examples": ["quote1", "quote2"]},
    {"dimension": "Respectfulness Analysis", "explanation": "detailed explanation of respectfulness score", "examples": ["quote1", "quote2"]}
  ],
  "writingTips": [
    {"tip": "actionable tip", "example": "example usage"},
    {"tip": "another tip", "example": "example usage"}
  ],
  "brandWords": [
    {"word": "keyword", "description": "why it matters", "examples": ["usage1", "usage2"]},
    {"word": "another word", "description": "explanation", "examples": ["usage1", "usage2"]}
  ]
}"#;

/// The user message: sanitized content, its source, and the exact JSON shape expected back.
pub fn user_prompt(text: &str, url: &str) -> String {
    format!(
        "Analyze the tone of voice for this website content using Nielsen Norman Group's methodology.\n\n\
         Content from {url}:\n{text}\n\n\
         Provide analysis in this exact JSON format:\n{RESPONSE_SHAPE}\n\n\
         Focus on actual quotes from the content for examples. Be specific and actionable."
    )
}

#[derive(Debug, Clone)]
pub struct ScorerSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    pub timeout_ms: u64,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_ms: DEFAULT_LLM_TIMEOUT_MS,
        }
    }
}

impl ScorerSettings {
    /// Defaults overridden by `TONEPIPE_OPENAI_BASE_URL`, `TONEPIPE_OPENAI_MODEL` and
    /// `TONEPIPE_LLM_TIMEOUT_MS`. Sampling parameters are fixed.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: crate::env("TONEPIPE_OPENAI_BASE_URL").unwrap_or(d.base_url),
            model: crate::env("TONEPIPE_OPENAI_MODEL").unwrap_or(d.model),
            timeout_ms: crate::env_u64("TONEPIPE_LLM_TIMEOUT_MS", d.timeout_ms),
            ..d
        }
    }
}

/// Tone scorer backed by an OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiToneScorer {
    client: reqwest::Client,
    settings: ScorerSettings,
}

impl OpenAiToneScorer {
    pub fn new(client: reqwest::Client, settings: ScorerSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ScorerSettings {
        &self.settings
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn chat(&self, key: &ApiKey, system: &str, user: &str) -> Result<ChatReply> {
        let req = ChatCompletionsRequest {
            model: self.settings.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
            stream: Some(false),
        };

        tracing::debug!(
            model = %self.settings.model,
            endpoint = %self.endpoint_chat_completions(),
            prompt_chars = user.chars().count(),
            "requesting tone analysis"
        );
        let resp = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(self.settings.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", key.expose()),
            )
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Scoring(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Scoring(format!(
                "chat completions HTTP {}",
                status.as_u16()
            )));
        }

        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| Error::Scoring(e.to_string()))?;
        Ok(ChatReply {
            content: parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content),
            total_tokens: parsed.usage.and_then(|u| u.total_tokens),
        })
    }
}

#[async_trait::async_trait]
impl ToneScorer for OpenAiToneScorer {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn score(
        &self,
        credential: Option<&ApiKey>,
        text: &str,
        url: &str,
    ) -> Result<ScoredProfile> {
        let key = credential.ok_or_else(|| {
            Error::NotConfigured("no API credential configured".to_string())
        })?;
        let reply = self.chat(key, SYSTEM_PROMPT, &user_prompt(text, url)).await?;
        let content = reply
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::Scoring("no analysis returned".to_string()))?;
        let profile = parse_analysis(&content)?;
        Ok(ScoredProfile {
            profile,
            token_usage: reply.total_tokens,
        })
    }
}

struct ChatReply {
    content: Option<String>,
    total_tokens: Option<u64>,
}

/// Strict decode of the model's reply into a [`ToneProfile`].
///
/// Fails closed: the text must be a JSON object with exactly four dimensions, one per
/// known name, each with a finite score in [0, 100]. The model's `dominantTerm` is not
/// trusted; it is re-derived from the score.
pub fn parse_analysis(raw: &str) -> Result<ToneProfile> {
    let parsed: RawAnalysis = serde_json::from_str(raw)
        .map_err(|e| Error::Scoring(format!("failed to parse analysis response: {e}")))?;
    let tone_dimensions = validate_dimensions(parsed.tone_dimensions)?;
    Ok(ToneProfile {
        tone_dimensions,
        detailed_analysis: parsed.detailed_analysis,
        writing_tips: parsed.writing_tips,
        brand_words: parsed.brand_words,
    })
}

fn invalid(detail: String) -> Error {
    Error::Scoring(format!("failed to parse analysis response: {detail}"))
}

fn validate_dimensions(raw: Vec<RawDimension>) -> Result<[ToneDimension; 4]> {
    if raw.len() != Dimension::ALL.len() {
        return Err(invalid(format!(
            "expected {} tone dimensions, got {}",
            Dimension::ALL.len(),
            raw.len()
        )));
    }
    let mut slots: [Option<ToneDimension>; 4] = [None, None, None, None];
    for r in raw {
        let dimension: Dimension = r.dimension.parse().map_err(|_| {
            invalid(format!("unknown tone dimension {:?}", r.dimension))
        })?;
        if !r.score.is_finite() || !(0.0..=100.0).contains(&r.score) {
            return Err(invalid(format!(
                "{dimension} score {} is outside 0-100",
                r.score
            )));
        }
        let idx = Dimension::ALL
            .iter()
            .position(|d| *d == dimension)
            .unwrap_or_default();
        if slots[idx].is_some() {
            return Err(invalid(format!("duplicate tone dimension {dimension}")));
        }
        slots[idx] = Some(ToneDimension::new(dimension, r.score));
    }
    let [Some(f), Some(s), Some(e), Some(r)] = slots else {
        return Err(invalid("missing tone dimension".to_string()));
    };
    Ok([f, s, e, r])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    tone_dimensions: Vec<RawDimension>,
    #[serde(default)]
    detailed_analysis: Vec<DetailedAnalysisItem>,
    #[serde(default)]
    writing_tips: Vec<WritingTip>,
    #[serde(default)]
    brand_words: Vec<BrandWord>,
}

#[derive(Debug, Deserialize)]
struct RawDimension {
    dimension: String,
    score: f64,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
}
