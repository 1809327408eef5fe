//! Deterministic lexical tone scorer, used when the AI path fails.
//!
//! Every score is a small linear formula over a handful of text statistics, so results are
//! explainable and stable across runs. Nothing here can fail: empty or degenerate text
//! yields a neutral profile.

use tonepipe_core::{BrandWord, DetailedAnalysisItem, ToneProfile, WritingTip};

/// Score used for every dimension when there is nothing to measure.
const NEUTRAL_SCORE: f64 = 50.0;

/// Average sentence length (tokens) above which the style reads as formal.
const FORMAL_SENTENCE_TOKENS: f64 = 15.0;

/// Text statistics shared by all four formulas.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStats {
    pub tokens: usize,
    pub sentences: Vec<String>,
    pub exclamations: usize,
    pub questions: usize,
    pub uppercase: usize,
}

impl TextStats {
    pub fn compute(text: &str) -> Self {
        let sentences = text
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            tokens: text.split_whitespace().count(),
            sentences,
            exclamations: text.matches('!').count(),
            questions: text.matches('?').count(),
            uppercase: text.chars().filter(|c| c.is_ascii_uppercase()).count(),
        }
    }

    /// `None` when there are no tokens or no sentences to divide by.
    pub fn avg_tokens_per_sentence(&self) -> Option<f64> {
        if self.tokens == 0 || self.sentences.is_empty() {
            return None;
        }
        Some(self.tokens as f64 / self.sentences.len() as f64)
    }

    fn uppercase_ratio(&self) -> f64 {
        if self.tokens == 0 {
            0.0
        } else {
            self.uppercase as f64 / self.tokens as f64
        }
    }
}

fn flag(cond: bool, weight: f64) -> f64 {
    if cond {
        weight
    } else {
        0.0
    }
}

/// Raw (unclamped) scores in canonical dimension order.
fn raw_scores(text: &str, stats: &TextStats) -> [f64; 4] {
    let Some(avg) = stats.avg_tokens_per_sentence() else {
        return [NEUTRAL_SCORE; 4];
    };
    let excl = stats.exclamations as f64;

    let formality = 50.0 + (avg - 15.0) * 2.0 - excl * 5.0;
    let seriousness = 50.0 + (avg - 12.0) * 3.0 - excl * 3.0;
    let enthusiasm = 30.0
        + excl * 10.0
        + flag(text.contains("amazing"), 10.0)
        + flag(text.contains("excited"), 10.0);
    let respectfulness = 70.0
        + flag(text.contains("please"), 5.0)
        + flag(text.contains("thank"), 5.0)
        - flag(stats.uppercase_ratio() > 0.1, 20.0);

    [formality, seriousness, enthusiasm, respectfulness]
}

fn writing_tips() -> Vec<WritingTip> {
    vec![
        WritingTip {
            tip: "Maintain consistent tone across all content".to_string(),
            example: Some("Use similar sentence structures and vocabulary choices".to_string()),
        },
        WritingTip {
            tip: "Consider your audience when adjusting formality".to_string(),
            example: Some(
                "Professional services may benefit from more formal language".to_string(),
            ),
        },
    ]
}

fn brand_words() -> Vec<BrandWord> {
    vec![BrandWord {
        word: "Consistent".to_string(),
        description: "Maintains steady tone throughout".to_string(),
        examples: vec![
            "reliable messaging".to_string(),
            "predictable voice".to_string(),
        ],
    }]
}

pub fn score_heuristically(text: &str) -> ToneProfile {
    let stats = TextStats::compute(text);
    let tone_dimensions = ToneProfile::dimensions_from_scores(raw_scores(text, &stats));

    let avg = stats.avg_tokens_per_sentence().unwrap_or(0.0);
    let style = if avg > FORMAL_SENTENCE_TOKENS {
        "formal"
    } else {
        "casual"
    };
    let detailed = DetailedAnalysisItem {
        dimension: "Content Analysis".to_string(),
        explanation: format!(
            "Based on heuristic analysis of {} words across {} sentences. \
             Average sentence length suggests {style} communication style.",
            stats.tokens,
            stats.sentences.len()
        ),
        examples: stats.sentences.iter().take(2).cloned().collect(),
    };

    ToneProfile {
        tone_dimensions,
        detailed_analysis: vec![detailed],
        writing_tips: writing_tips(),
        brand_words: brand_words(),
    }
}
