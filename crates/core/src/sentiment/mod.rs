//! Text + voice-tone sentiment fusion.
//!
//! The reasoning service is asked for a single `{"label", "score"}` object.
//! Its reply is parsed defensively and every failure collapses to a neutral
//! result, so [`SentimentFusionEngine::analyze`] never fails.

use crate::chat::{ChatError, ChatMessage, ChatRequest, ChatService};
use crate::config::DEFAULT_MAX_SENTIMENT_WORDS;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const NEUTRAL_SCORE: f64 = 0.5;
pub const SENTIMENT_MAX_TOKENS: u32 = 50;
pub const SENTIMENT_TEMPERATURE: f32 = 0.1;
const CODE_FENCE: &str = "```";
const LOG_TARGET: &str = "sentiment";

const SYSTEM_PROMPT: &str = "You are an expert in emotion analysis. Judge the speaker's emotional state \
from the TRANSCRIPT and the VOICE TONE information together.\n\
Reply ONLY with a JSON object in exactly this format and nothing else:\n\
{\"label\": \"positive|negative|neutral\", \"score\": 0.0-1.0}\n\n\
Rules:\n\
- positive: happiness, joy, excitement, contentment, gratitude, hope, laughter, liveliness\n\
- negative: sadness, anger, frustration, disappointment, fear, worry, stress\n\
- neutral: ONLY when both the text and the voice tone are genuinely neutral\n\
- score: how strong the emotion is (0.5 = weak, 1.0 = very strong)\n\
- Weigh the voice tone at least as heavily as the literal words\n\
- A loud, highly variable or excited voice makes neutral very unlikely\n\
- Laughter, bursts of high energy -> positive\n\
- A quiet, monotone, heavy voice -> likely negative or neutral\n\
- Return only the JSON, no explanation.";

const VOICE_SECTION: &str = "\n\nIMPORTANT - voice tone (from acoustic analysis):\n\
Always take the voice cues below into account. Even when the text looks neutral \
the voice may be emotional. The voice cues are measured directly from the waveform \
and are more reliable than the words.\n";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Case- and whitespace-insensitive; anything unrecognised is neutral.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f64,
}

impl SentimentResult {
    /// Clamps `score` into [0, 1]; a non-finite score becomes the neutral score.
    pub fn new(label: SentimentLabel, score: f64) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            NEUTRAL_SCORE
        };
        Self { label, score }
    }

    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: NEUTRAL_SCORE,
        }
    }
}

impl Default for SentimentResult {
    fn default() -> Self {
        Self::neutral()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SentimentError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("reply is not a JSON object: {0}")]
    Malformed(String),

    #[error("reply is missing `{0}`")]
    MissingField(&'static str),

    #[error("score is not a number: {0}")]
    InvalidScore(String),
}

/// Removes a fenced-code wrapper and its optional language tag, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.contains(CODE_FENCE) {
        return trimmed;
    }
    let inner = trimmed.split(CODE_FENCE).nth(1).unwrap_or_default();
    let inner = inner.trim_start_matches([' ', '\t']);
    let tag_len = inner
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(inner.len());
    let rest = &inner[tag_len..];
    let opens_body = rest.is_empty()
        || rest.starts_with(char::is_whitespace)
        || rest.starts_with(['{', '[']);
    if tag_len > 0 && opens_body {
        rest.trim()
    } else {
        inner.trim()
    }
}

/// Parses a label/score reply; the label is normalised and the score clamped.
pub fn parse_sentiment_reply(raw: &str) -> Result<SentimentResult, SentimentError> {
    let body = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| SentimentError::Malformed(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| SentimentError::Malformed(format!("expected object, got {value}")))?;

    let label = object
        .get("label")
        .and_then(Value::as_str)
        .ok_or(SentimentError::MissingField("label"))?;
    let score = match object.get("score") {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| SentimentError::InvalidScore(n.to_string()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| SentimentError::InvalidScore(s.clone()))?,
        Some(other) => return Err(SentimentError::InvalidScore(other.to_string())),
        None => return Err(SentimentError::MissingField("score")),
    };

    Ok(SentimentResult::new(SentimentLabel::parse(label), score))
}

pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_sentiment_request(text: &str, voice_cues: Option<&str>) -> ChatRequest {
    let mut user = format!("TRANSCRIPT: \"{text}\"");
    if let Some(cues) = voice_cues.map(str::trim).filter(|c| !c.is_empty()) {
        user.push_str(VOICE_SECTION);
        user.push_str("Voice cues: ");
        user.push_str(cues);
    }
    ChatRequest {
        messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)],
        max_tokens: SENTIMENT_MAX_TOKENS,
        temperature: SENTIMENT_TEMPERATURE,
    }
}

/// Fuses transcript text with acoustic cues into a sentiment label.
#[derive(Clone)]
pub struct SentimentFusionEngine<C> {
    chat: C,
    max_words: usize,
}

impl<C: ChatService> SentimentFusionEngine<C> {
    pub fn new(chat: C) -> Self {
        Self {
            chat,
            max_words: DEFAULT_MAX_SENTIMENT_WORDS,
        }
    }

    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    /// Always yields a result; any failure resolves to neutral / 0.5.
    pub async fn analyze(&self, text: &str, voice_cues: Option<&str>) -> SentimentResult {
        match self.try_analyze(text, voice_cues).await {
            Ok(result) => {
                tracing::info!(
                    target: LOG_TARGET,
                    label = %result.label,
                    score = result.score,
                    "sentiment resolved"
                );
                result
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "sentiment fell back to neutral");
                SentimentResult::neutral()
            }
        }
    }

    pub async fn try_analyze(
        &self,
        text: &str,
        voice_cues: Option<&str>,
    ) -> Result<SentimentResult, SentimentError> {
        let text = truncate_words(text, self.max_words);
        let request = build_sentiment_request(&text, voice_cues);
        let raw = self.chat.complete(request).await?;
        tracing::debug!(target: LOG_TARGET, raw = %raw, "sentiment reply");
        parse_sentiment_reply(&raw)
    }
}
