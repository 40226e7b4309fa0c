use crate::asr::{AudioContainer, SpeechToText, SttError, SttReply};
use crate::config::{ApiKey, ServiceConfig};
use crate::util::is_loading_status;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const LOG_TARGET: &str = "asr::huggingface";

/// Whisper hosted behind the Hugging Face inference router.
#[derive(Clone)]
pub struct HfSpeechToText {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl HfSpeechToText {
    pub fn new(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.stt_base_url.clone(),
            model: config.stt_model.clone(),
            timeout: config.transcription_timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[derive(Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Deserialize)]
struct LoadingResponse {
    estimated_time: Option<f64>,
}

/// Pulls the `estimated_time` hint out of a model-loading reply body.
pub fn parse_estimated_wait(body: &str) -> Option<f64> {
    serde_json::from_str::<LoadingResponse>(body)
        .ok()
        .and_then(|r| r.estimated_time)
}

impl SpeechToText for HfSpeechToText {
    fn recognize(
        &self,
        audio: Bytes,
        container: AudioContainer,
    ) -> BoxFuture<'_, Result<SttReply, SttError>> {
        let this = self.clone();
        async move {
            let url = this.url();
            tracing::debug!(
                target: LOG_TARGET,
                model = %this.model,
                bytes = audio.len(),
                content_type = container.content_type(),
                "sending audio to speech service"
            );

            let response = this
                .client
                .post(&url)
                .bearer_auth(this.api_key.expose())
                .header(CONTENT_TYPE, container.content_type())
                .timeout(this.timeout)
                .body(audio)
                .send()
                .await?;

            let status = response.status();
            if is_loading_status(status.as_u16()) {
                let body = response.text().await.unwrap_or_default();
                return Ok(SttReply::Loading {
                    estimated_wait_secs: parse_estimated_wait(&body),
                });
            }

            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(SttError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: WhisperResponse = response
                .json()
                .await
                .map_err(|e| SttError::InvalidResponse(format!("Failed to parse JSON: {}", e)))?;

            Ok(SttReply::Transcribed {
                text: parsed.text,
                language: parsed.language,
            })
        }
        .boxed()
    }
}
