mod client;
mod huggingface;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub use client::{TranscriptionClient, TranscriptionError};
pub use huggingface::{parse_estimated_wait, HfSpeechToText};

/// Language reported when the service does not detect one.
pub const AUTO_LANGUAGE: &str = "auto";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub language: String,
}

impl Transcript {
    pub fn new(text: &str, language: Option<String>) -> Self {
        Self {
            text: text.trim().to_owned(),
            language: language
                .map(|l| l.trim().to_owned())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| AUTO_LANGUAGE.to_owned()),
        }
    }
}

/// Audio containers accepted for transcription.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioContainer {
    #[default]
    M4a,
    Mp3,
    Wav,
    Aac,
}

impl AudioContainer {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "m4a" => Some(Self::M4a),
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "aac" => Some(Self::Aac),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::M4a => "audio/m4a",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Aac => "audio/aac",
        }
    }
}

/// One reply from the speech-to-text service.
#[derive(Clone, Debug, PartialEq)]
pub enum SttReply {
    Transcribed {
        text: String,
        language: Option<String>,
    },
    /// The model is warming up; retry after the optional estimate (seconds).
    Loading { estimated_wait_secs: Option<f64> },
}

#[derive(thiserror::Error, Debug)]
pub enum SttError {
    #[error("speech service timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("http error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SttError {
    /// Faults worth another attempt after a fixed delay.
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network(_) | Self::InvalidResponse(_)
        )
    }
}

impl From<reqwest::Error> for SttError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

pub trait SpeechToText: Send + Sync {
    fn recognize(
        &self,
        audio: Bytes,
        container: AudioContainer,
    ) -> BoxFuture<'_, Result<SttReply, SttError>>;
}

impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    fn recognize(
        &self,
        audio: Bytes,
        container: AudioContainer,
    ) -> BoxFuture<'_, Result<SttReply, SttError>> {
        (**self).recognize(audio, container)
    }
}
