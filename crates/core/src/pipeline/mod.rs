use crate::{
    acoustic::{AcousticFeatureExtractor, AcousticFeatures},
    asr::{AudioContainer, SpeechToText, Transcript, TranscriptionClient, TranscriptionError},
    chat::ChatService,
    config::AnalysisConfig,
    decode::AudioDecoder,
    feedback::FeedbackGenerator,
    sentiment::{SentimentFusionEngine, SentimentLabel, SentimentResult},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const UNINTELLIGIBLE_TRANSCRIPT: &str = "Audio recording could not be understood.";
pub const UNINTELLIGIBLE_FEEDBACK: &str =
    "The audio quality was too low to analyse. Please try recording more clearly.";
pub const UNKNOWN_LANGUAGE: &str = "unknown";
const LOG_TARGET: &str = "pipeline";

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PipelineResult {
    pub transcript: Transcript,
    pub sentiment: SentimentResult,
    pub feedback: String,
    pub language: String,
}

impl PipelineResult {
    /// Fixed result for recordings whose transcript is too short to analyse.
    pub fn unintelligible() -> Self {
        Self {
            transcript: Transcript {
                text: UNINTELLIGIBLE_TRANSCRIPT.to_owned(),
                language: UNKNOWN_LANGUAGE.to_owned(),
            },
            sentiment: SentimentResult::new(SentimentLabel::Neutral, 0.5),
            feedback: UNINTELLIGIBLE_FEEDBACK.to_owned(),
            language: UNKNOWN_LANGUAGE.to_owned(),
        }
    }
}

/// Wall-clock time spent in each stage; skipped stages stay zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub transcription: Duration,
    pub acoustics: Duration,
    pub sentiment: Duration,
    pub feedback: Duration,
    pub total: Duration,
}

fn elapsed_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Transcription -> acoustics -> sentiment fusion -> feedback, strictly in order.
pub struct Pipeline<S, C, D> {
    transcription: TranscriptionClient<S>,
    acoustics: AcousticFeatureExtractor,
    sentiment: SentimentFusionEngine<C>,
    feedback: FeedbackGenerator<C>,
    decoder: D,
    min_transcript_chars: usize,
}

impl<S, C, D> Pipeline<S, C, D>
where
    S: SpeechToText,
    C: ChatService + Clone,
    D: AudioDecoder,
{
    pub fn new(stt: S, chat: C, decoder: D, config: &AnalysisConfig) -> Self {
        Self {
            transcription: TranscriptionClient::new(stt, config.retry.clone()),
            acoustics: AcousticFeatureExtractor::new(config.cues.clone()),
            sentiment: SentimentFusionEngine::new(chat.clone())
                .with_max_words(config.limits.max_sentiment_words),
            feedback: FeedbackGenerator::new(chat)
                .with_language(config.feedback_language.clone())
                .with_max_chars(config.limits.max_feedback_chars),
            decoder,
            min_transcript_chars: config.limits.min_transcript_chars,
        }
    }

    pub async fn run(
        &self,
        audio: Bytes,
        container: AudioContainer,
    ) -> Result<PipelineResult, PipelineError> {
        self.run_timed(audio, container)
            .await
            .map(|(result, _)| result)
    }

    pub async fn run_timed(
        &self,
        audio: Bytes,
        container: AudioContainer,
    ) -> Result<(PipelineResult, StageTimings), PipelineError> {
        let started = Instant::now();
        let mut timings = StageTimings::default();

        let t = Instant::now();
        let transcript = self
            .transcription
            .transcribe(audio.clone(), container)
            .await?;
        timings.transcription = t.elapsed();
        tracing::info!(
            target: LOG_TARGET,
            elapsed_ms = elapsed_ms(timings.transcription),
            "transcription stage done"
        );

        if transcript.text.trim().chars().count() < self.min_transcript_chars {
            timings.total = started.elapsed();
            tracing::warn!(
                target: LOG_TARGET,
                chars = transcript.text.trim().chars().count(),
                min = self.min_transcript_chars,
                "transcript too short, skipping analysis"
            );
            return Ok((PipelineResult::unintelligible(), timings));
        }

        let t = Instant::now();
        let features = self.analyze_acoustics(audio).await;
        timings.acoustics = t.elapsed();
        tracing::info!(
            target: LOG_TARGET,
            elapsed_ms = elapsed_ms(timings.acoustics),
            "acoustic stage done"
        );

        let t = Instant::now();
        let sentiment = self
            .sentiment
            .analyze(&transcript.text, features.voice_cues())
            .await;
        timings.sentiment = t.elapsed();
        tracing::info!(
            target: LOG_TARGET,
            elapsed_ms = elapsed_ms(timings.sentiment),
            "sentiment stage done"
        );

        let t = Instant::now();
        let feedback = self
            .feedback
            .generate(&transcript.text, sentiment.label)
            .await;
        timings.feedback = t.elapsed();
        timings.total = started.elapsed();
        tracing::info!(
            target: LOG_TARGET,
            elapsed_ms = elapsed_ms(timings.feedback),
            total_ms = elapsed_ms(timings.total),
            "pipeline done"
        );

        let language = transcript.language.clone();
        Ok((
            PipelineResult {
                transcript,
                sentiment,
                feedback,
                language,
            },
            timings,
        ))
    }

    async fn analyze_acoustics(&self, audio: Bytes) -> AcousticFeatures {
        match self.decoder.decode(audio).await {
            Ok(samples) => self.acoustics.extract(&samples),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "audio decode failed, acoustic cues unavailable");
                AcousticFeatures::unavailable()
            }
        }
    }
}
