use crate::chat::{ChatError, ChatMessage, ChatRequest, ChatService};
use crate::config::{ApiKey, ServiceConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat completions on the Hugging Face router.
#[derive(Clone)]
pub struct HfChatClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl HfChatClient {
    pub fn new(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.chat_base_url.clone(),
            model: config.chat_model.clone(),
            timeout: config.chat_timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_text(response: CompletionResponse) -> Result<String, ChatError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_owned())
        .unwrap_or_default();
    if content.is_empty() {
        return Err(ChatError::EmptyResponse);
    }
    Ok(content)
}

impl ChatService for HfChatClient {
    fn complete(&self, request: ChatRequest) -> BoxFuture<'_, Result<String, ChatError>> {
        let this = self.clone();
        async move {
            let body = CompletionRequest {
                model: &this.model,
                messages: &request.messages,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
                stream: false,
            };

            let response = this
                .client
                .post(this.url())
                .bearer_auth(this.api_key.expose())
                .timeout(this.timeout)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(ChatError::Status {
                    status: status.as_u16(),
                    body: error_text,
                });
            }

            let parsed: CompletionResponse = response
                .json()
                .await
                .map_err(|e| ChatError::InvalidResponse(format!("Failed to parse JSON: {}", e)))?;

            first_choice_text(parsed)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<String, ChatError> {
        first_choice_text(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn takes_first_choice_trimmed() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  hi there \n"}},{"message":{"content":"other"}}]}"#;
        assert_eq!(parse(raw).unwrap(), "hi there");
    }

    #[test]
    fn empty_or_missing_content_is_an_error() {
        assert!(matches!(parse(r#"{"choices":[]}"#), Err(ChatError::EmptyResponse)));
        assert!(matches!(
            parse(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(ChatError::EmptyResponse)
        ));
        assert!(matches!(
            parse(r#"{"choices":[{"message":{"content":"   "}}]}"#),
            Err(ChatError::EmptyResponse)
        ));
    }

    #[test]
    fn request_body_uses_wire_names() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hello")];
        let body = CompletionRequest {
            model: "m",
            messages: &messages,
            max_tokens: 50,
            temperature: 0.1,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
        assert_eq!(json["max_tokens"], 50);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn url_appends_completions_path() {
        let cfg = ServiceConfig::new(ApiKey::new("k").unwrap());
        let chat = HfChatClient::new(Client::new(), &cfg).with_base_url("http://llm/v1/".into());
        assert_eq!(chat.url(), "http://llm/v1/chat/completions");
    }
}
