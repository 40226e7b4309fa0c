use crate::acoustic::CueTable;
use crate::util::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

pub const DEFAULT_STT_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";
pub const DEFAULT_STT_MODEL: &str = "openai/whisper-large-v3-turbo";
pub const DEFAULT_CHAT_BASE_URL: &str = "https://router.huggingface.co/v1";
pub const DEFAULT_CHAT_MODEL: &str = "Qwen/Qwen2.5-72B-Instruct";
pub const DEFAULT_FEEDBACK_LANGUAGE: &str = "English";
pub const DEFAULT_TRANSCRIPTION_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_SENTIMENT_WORDS: usize = 400;
pub const DEFAULT_MAX_FEEDBACK_CHARS: usize = 500;
pub const DEFAULT_MIN_TRANSCRIPT_CHARS: usize = 5;
pub const ENV_HF_API_TOKEN: &str = "HF_API_TOKEN";
pub const ENV_STT_BASE_URL: &str = "VOICE_DIARY_STT_URL";
pub const ENV_CHAT_BASE_URL: &str = "VOICE_DIARY_CHAT_URL";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

/// Endpoints, models and per-call timeouts for the two remote services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_key: ApiKey,
    pub stt_base_url: String,
    pub stt_model: String,
    pub chat_base_url: String,
    pub chat_model: String,
    pub transcription_timeout: Duration,
    pub chat_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            stt_base_url: DEFAULT_STT_BASE_URL.to_owned(),
            stt_model: DEFAULT_STT_MODEL.to_owned(),
            chat_base_url: DEFAULT_CHAT_BASE_URL.to_owned(),
            chat_model: DEFAULT_CHAT_MODEL.to_owned(),
            transcription_timeout: Duration::from_secs(DEFAULT_TRANSCRIPTION_TIMEOUT_SECS),
            chat_timeout: Duration::from_secs(DEFAULT_CHAT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeouts(
        mut self,
        transcription_secs: u64,
        chat_secs: u64,
    ) -> Result<Self, ConfigError> {
        if transcription_secs == 0 || chat_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        self.transcription_timeout = Duration::from_secs(transcription_secs);
        self.chat_timeout = Duration::from_secs(chat_secs);
        Ok(self)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextLimits {
    /// Words of transcript sent for sentiment fusion.
    pub max_sentiment_words: usize,
    /// Characters of transcript sent for feedback generation.
    pub max_feedback_chars: usize,
    /// Trimmed transcripts shorter than this short-circuit the pipeline.
    pub min_transcript_chars: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            max_sentiment_words: DEFAULT_MAX_SENTIMENT_WORDS,
            max_feedback_chars: DEFAULT_MAX_FEEDBACK_CHARS,
            min_transcript_chars: DEFAULT_MIN_TRANSCRIPT_CHARS,
        }
    }
}

/// Everything the analysis pipeline needs besides its collaborators.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub retry: RetryPolicy,
    pub cues: CueTable,
    pub limits: TextLimits,
    pub feedback_language: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cues: CueTable::default(),
            limits: TextLimits::default(),
            feedback_language: DEFAULT_FEEDBACK_LANGUAGE.to_owned(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.cues.validate()?;
        if self.feedback_language.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub services: ServiceConfig,
    pub analysis: AnalysisConfig,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("no api key given; pass --hf-api-token or set {ENV_HF_API_TOKEN}")]
    MissingApiKey,
    #[error("timeouts must be > 0 s")]
    ZeroTimeout,
    #[error("feedback language must not be empty")]
    EmptyLanguage,
    #[error("invalid cue table: {0}")]
    InvalidCueTable(String),
    #[error("retry policy needs at least one attempt")]
    ZeroAttempts,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

pub fn require_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<ApiKey, ConfigError> {
    resolve_api_key(cli_value, env_key, env)?.ok_or(ConfigError::MissingApiKey)
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn non_empty_language(value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyLanguage);
    }
    Ok(value.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_cli_takes_precedence_over_env() {
        let env = MapEnv::default().with_var(ENV_HF_API_TOKEN, "env-key");
        let key = resolve_api_key(Some("cli-key".to_owned()), ENV_HF_API_TOKEN, &env)
            .expect("valid key")
            .expect("present");
        assert_eq!(key.expose(), "cli-key");
    }

    #[test]
    fn api_key_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_HF_API_TOKEN, "env-key");
        let key = require_api_key(None, ENV_HF_API_TOKEN, &env).expect("present");
        assert_eq!(key.expose(), "env-key");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let env = MapEnv::default();
        assert_eq!(
            require_api_key(None, ENV_HF_API_TOKEN, &env),
            Err(ConfigError::MissingApiKey)
        );
        assert_eq!(
            require_api_key(Some("  ".to_owned()), ENV_HF_API_TOKEN, &env),
            Err(ConfigError::EmptyApiKey)
        );
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("hf_secret").unwrap();
        assert!(!format!("{key:?}").contains("hf_secret"));
        let services = ServiceConfig::new(key);
        assert!(!format!("{services:?}").contains("hf_secret"));
    }

    #[test]
    fn zero_timeouts_rejected() {
        let services = ServiceConfig::new(ApiKey::new("k").unwrap());
        assert_eq!(
            services.clone().with_timeouts(0, 10),
            Err(ConfigError::ZeroTimeout)
        );
        let ok = services.with_timeouts(30, 10).unwrap();
        assert_eq!(ok.transcription_timeout, Duration::from_secs(30));
        assert_eq!(ok.chat_timeout, Duration::from_secs(10));
    }

    #[test]
    fn resolve_string_with_default_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_CHAT_BASE_URL, "http://local");
        let v = resolve_string_with_default(None, ENV_CHAT_BASE_URL, &env, "def");
        assert_eq!(v, "http://local");
    }

    #[test]
    fn resolve_string_with_default_default_used_when_both_missing() {
        let env = MapEnv::default();
        let v = resolve_string_with_default(None, ENV_CHAT_BASE_URL, &env, "def");
        assert_eq!(v, "def");
    }

    #[test]
    fn analysis_defaults_match_documented_limits() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.limits.max_sentiment_words, 400);
        assert_eq!(cfg.limits.max_feedback_chars, 500);
        assert_eq!(cfg.limits.min_transcript_chars, 5);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.feedback_language, "English");
    }

    #[test]
    fn analysis_validation_rejects_zero_attempts() {
        let mut cfg = AnalysisConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        cfg.retry.max_attempts = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAttempts));
    }

    #[test]
    fn empty_language_rejected() {
        assert_eq!(non_empty_language(" ".to_owned()), Err(ConfigError::EmptyLanguage));
        assert_eq!(non_empty_language(" Turkish ".to_owned()).unwrap(), "Turkish");
    }
}
