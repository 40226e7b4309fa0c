use crate::asr::{AudioContainer, SpeechToText, SttError, SttReply, Transcript};
use crate::util::RetryPolicy;
use bytes::Bytes;
use tokio::time::sleep;

const LOG_TARGET: &str = "asr::client";

#[derive(thiserror::Error, Debug)]
pub enum TranscriptionError {
    #[error("transcription failed: {0}")]
    Failed(#[source] SttError),

    #[error("transcription gave up after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Option<SttError>,
    },
}

/// Calls the speech-to-text service, waiting out model warm-up and transport faults.
#[derive(Clone)]
pub struct TranscriptionClient<S> {
    service: S,
    policy: RetryPolicy,
}

impl<S: SpeechToText> TranscriptionClient<S> {
    pub fn new(service: S, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn transcribe(
        &self,
        audio: Bytes,
        container: AudioContainer,
    ) -> Result<Transcript, TranscriptionError> {
        let max = self.policy.attempts();
        let mut last_error = None;

        for attempt in 1..=max {
            let wait = match self.service.recognize(audio.clone(), container).await {
                Ok(SttReply::Transcribed { text, language }) => {
                    let transcript = Transcript::new(&text, language);
                    tracing::info!(
                        target: LOG_TARGET,
                        attempt,
                        chars = transcript.text.chars().count(),
                        language = %transcript.language,
                        "transcription completed"
                    );
                    return Ok(transcript);
                }
                Ok(SttReply::Loading {
                    estimated_wait_secs,
                }) => {
                    let wait = self.policy.loading_wait(estimated_wait_secs);
                    tracing::warn!(
                        target: LOG_TARGET,
                        attempt,
                        max,
                        wait_ms = wait.as_millis() as u64,
                        "speech model loading"
                    );
                    wait
                }
                Err(e) if e.is_transport_fault() => {
                    let wait = self.policy.transport_wait();
                    tracing::warn!(
                        target: LOG_TARGET,
                        attempt,
                        max,
                        error = %e,
                        wait_ms = wait.as_millis() as u64,
                        "speech service unreachable"
                    );
                    last_error = Some(e);
                    wait
                }
                Err(e) => {
                    tracing::error!(target: LOG_TARGET, attempt, error = %e, "speech service rejected request");
                    return Err(TranscriptionError::Failed(e));
                }
            };

            if attempt < max {
                sleep(wait).await;
            }
        }

        Err(TranscriptionError::Exhausted {
            attempts: max,
            last: last_error,
        })
    }
}
