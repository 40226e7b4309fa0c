use crate::chat::{ChatError, ChatMessage, ChatRequest, ChatService};
use crate::config::{DEFAULT_FEEDBACK_LANGUAGE, DEFAULT_MAX_FEEDBACK_CHARS};
use crate::sentiment::SentimentLabel;

pub const FEEDBACK_MAX_TOKENS: u32 = 200;
pub const FEEDBACK_TEMPERATURE: f32 = 0.7;
const LOG_TARGET: &str = "feedback";

pub const POSITIVE_FALLBACK: &str = "Wonderful! Thank you for sharing your happiness. \
Keep holding on to this positive energy!";
pub const NEGATIVE_FALLBACK: &str = "I understand you are going through a hard time. \
Sharing these feelings matters. Things will get better, be patient with yourself.";
pub const NEUTRAL_FALLBACK: &str = "Thank you for sharing your thoughts. \
Expressing yourself is a healthy habit.";

pub fn tone_phrase(label: SentimentLabel) -> &'static str {
    match label {
        SentimentLabel::Positive => "happy and positive",
        SentimentLabel::Negative => "sad or distressed",
        SentimentLabel::Neutral => "calm and reflective",
    }
}

pub fn fallback_message(label: SentimentLabel) -> &'static str {
    match label {
        SentimentLabel::Positive => POSITIVE_FALLBACK,
        SentimentLabel::Negative => NEGATIVE_FALLBACK,
        SentimentLabel::Neutral => NEUTRAL_FALLBACK,
    }
}

/// Writes a short empathetic reply to a diary entry; falls back to a canned message.
#[derive(Clone)]
pub struct FeedbackGenerator<C> {
    chat: C,
    language: String,
    max_chars: usize,
}

impl<C: ChatService> FeedbackGenerator<C> {
    pub fn new(chat: C) -> Self {
        Self {
            chat,
            language: DEFAULT_FEEDBACK_LANGUAGE.to_owned(),
            max_chars: DEFAULT_MAX_FEEDBACK_CHARS,
        }
    }

    pub fn with_language(mut self, language: String) -> Self {
        self.language = language;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn build_request(&self, transcript: &str, label: SentimentLabel) -> ChatRequest {
        let excerpt: String = transcript.chars().take(self.max_chars).collect();
        let system = format!(
            "You are an empathetic voice diary assistant. You have listened to the user's \
             recording and analysed it. Write warm, sincere and supportive feedback in {}. \
             At most 3 sentences. Keep it short.",
            self.language
        );
        let user = format!(
            "What the user said: \"{excerpt}\"\nEmotional state: {}",
            tone_phrase(label)
        );
        ChatRequest {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            max_tokens: FEEDBACK_MAX_TOKENS,
            temperature: FEEDBACK_TEMPERATURE,
        }
    }

    pub async fn try_generate(
        &self,
        transcript: &str,
        label: SentimentLabel,
    ) -> Result<String, ChatError> {
        let reply = self
            .chat
            .complete(self.build_request(transcript, label))
            .await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(reply.to_owned())
    }

    /// Never fails; errors resolve to the canned message for `label`.
    pub async fn generate(&self, transcript: &str, label: SentimentLabel) -> String {
        match self.try_generate(transcript, label).await {
            Ok(text) => {
                tracing::info!(target: LOG_TARGET, %label, chars = text.chars().count(), "feedback generated");
                text
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, %label, error = %e, "feedback fell back to canned message");
                fallback_message(label).to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct StubChat {
        reply: Result<&'static str, fn() -> ChatError>,
        seen: Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl StubChat {
        fn new(reply: Result<&'static str, fn() -> ChatError>) -> Self {
            Self {
                reply,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ChatService for StubChat {
        fn complete(&self, request: ChatRequest) -> BoxFuture<'_, Result<String, ChatError>> {
            self.seen.lock().unwrap().push(request);
            let reply = self.reply.map(str::to_owned).map_err(|make| make());
            async move { reply }.boxed()
        }
    }

    #[test]
    fn tone_table_defaults_unknown_labels_to_neutral() {
        assert_eq!(tone_phrase(SentimentLabel::Positive), "happy and positive");
        assert_eq!(tone_phrase(SentimentLabel::Negative), "sad or distressed");
        assert_eq!(
            tone_phrase(SentimentLabel::parse("furious")),
            "calm and reflective"
        );
        assert_eq!(fallback_message(SentimentLabel::parse("???")), NEUTRAL_FALLBACK);
    }

    #[tokio::test]
    async fn returns_model_text_trimmed() {
        let chat = StubChat::new(Ok("  That sounds like a lovely afternoon.  "));
        let generator = FeedbackGenerator::new(chat.clone());
        let text = generator
            .generate("We went to the park", SentimentLabel::Positive)
            .await;
        assert_eq!(text, "That sounds like a lovely afternoon.");

        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0].max_tokens, FEEDBACK_MAX_TOKENS);
        assert!(seen[0].messages[0].content.contains("in English"));
        assert!(seen[0].messages[1].content.contains("happy and positive"));
    }

    #[tokio::test]
    async fn transport_errors_fall_back_per_label() {
        for (label, expected) in [
            (SentimentLabel::Positive, POSITIVE_FALLBACK),
            (SentimentLabel::Negative, NEGATIVE_FALLBACK),
            (SentimentLabel::Neutral, NEUTRAL_FALLBACK),
        ] {
            let generator = FeedbackGenerator::new(StubChat::new(Err(|| ChatError::Timeout)));
            assert_eq!(generator.generate("anything", label).await, expected);
        }
    }

    #[tokio::test]
    async fn blank_reply_falls_back() {
        let generator = FeedbackGenerator::new(StubChat::new(Ok("   ")));
        assert_eq!(
            generator.generate("anything", SentimentLabel::Negative).await,
            NEGATIVE_FALLBACK
        );
    }

    #[test]
    fn request_truncates_transcript_and_uses_language() {
        let generator = FeedbackGenerator::new(StubChat::new(Ok("x")))
            .with_language("Turkish".to_owned())
            .with_max_chars(5);
        let request = generator.build_request("çok güzel bir gün", SentimentLabel::Neutral);
        assert!(request.messages[0].content.contains("in Turkish"));
        assert!(request.messages[1].content.contains("\"çok g\""));
        assert!(request.messages[1].content.contains("calm and reflective"));
    }
}
