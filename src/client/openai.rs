use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::types::LlmConfig;

use super::completion::{ChatMessage, CompletionClient, SamplingParams};
use super::{ClientError, ClientResult};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    params: SamplingParams,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> ClientResult<Self> {
        let api_key = match config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key.to_string(),
            _ => {
                return Err(ClientError::Config(
                    "API key must be set via API_KEY or OPENAI_API_KEY".to_string(),
                ))
            }
        };

        let http = Client::builder()
            .user_agent("trade-sql-bot/0.1")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key,
            params: SamplingParams::from(config),
            max_retries: config.max_retries,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn backoff(attempt: u32) -> Duration {
        let capped = attempt.min(5);
        let millis = 500 * (1_u64 << capped);
        Duration::from_millis(millis.min(8_000))
    }

    fn first_content(resp: CompletionResponse) -> ClientResult<String> {
        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ClientError::EmptyCompletion)
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> ClientResult<String> {
        let url = self.completions_url();
        let body = CompletionRequest {
            model: &self.params.model,
            messages,
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            top_p: self.params.top_p,
        };

        let mut attempt = 0;
        loop {
            let sent = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match sent {
                Ok(resp) => {
                    if resp.status().is_success() {
                        let bytes = resp.bytes().await?;
                        let parsed: CompletionResponse = serde_json::from_slice(&bytes)?;
                        debug!(target: "chatbot", model = %self.params.model, attempt, "completion received");
                        return Self::first_content(parsed);
                    }

                    if resp.status().is_server_error() && attempt < self.max_retries {
                        attempt += 1;
                        warn!(target: "chatbot", status = %resp.status(), attempt, "completion endpoint error, retrying");
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }

                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ClientError::HttpStatus { status, body });
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        warn!(target: "chatbot", error = %err, attempt, "completion request failed, retrying");
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }

                    return Err(ClientError::Http(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(base_url: &str) -> LlmConfig {
        LlmConfig {
            base_url: base_url.to_string(),
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let cfg = LlmConfig::default();
        let err = OpenAiClient::new(&cfg).err().expect("expected config error");
        assert!(matches!(err, ClientError::Config(_)));

        let blank = LlmConfig {
            api_key: Some("   ".to_string()),
            ..LlmConfig::default()
        };
        assert!(OpenAiClient::new(&blank).is_err());
    }

    #[test]
    fn completions_url_handles_trailing_slash() {
        let client = OpenAiClient::new(&config_with_key("https://api.openai.com/v1/")).unwrap();
        assert_eq!(
            client.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn request_body_carries_sampling_params() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            temperature: 0.7,
            max_tokens: 256,
            top_p: 1.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["max_tokens"], 256);
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn first_content_takes_first_choice_verbatim() {
        let raw = r#"{"choices":[
            {"message":{"role":"assistant","content":"  SELECT 1;\n"}},
            {"message":{"role":"assistant","content":"SELECT 2"}}
        ]}"#;
        let resp: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(OpenAiClient::first_content(resp).unwrap(), "  SELECT 1;\n");
    }

    #[test]
    fn no_choices_is_empty_completion() {
        let resp: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            OpenAiClient::first_content(resp),
            Err(ClientError::EmptyCompletion)
        ));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(OpenAiClient::backoff(1), Duration::from_millis(1_000));
        assert_eq!(OpenAiClient::backoff(10), Duration::from_millis(8_000));
    }
}
