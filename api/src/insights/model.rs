use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use url::Url;

use vitals_core::parse::RawInsight;

use super::prompt::{InsightPrompt, truncate_chars};
use crate::config::ModelConfig;

/// Failure of the model call itself. Distinct from a parse failure: the
/// model never produced usable text.
#[derive(Debug, thiserror::Error)]
pub enum InsightRequestError {
    #[error("model request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("model endpoint unreachable: {0}")]
    Transport(String),
    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model endpoint returned an unreadable body: {0}")]
    Decode(String),
    #[error("model returned no content")]
    EmptyResponse,
}

/// The language-model seam. One call per insight run, no retries.
pub trait InsightModel: Send + Sync {
    fn request_insight(
        &self,
        prompt: &InsightPrompt,
    ) -> impl Future<Output = Result<RawInsight, InsightRequestError>> + Send;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct ChatCompletionsModel {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl ChatCompletionsModel {
    pub fn new(config: &ModelConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: config.timeout,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> InsightRequestError {
        if err.is_timeout() {
            InsightRequestError::Timeout(self.timeout)
        } else if err.is_decode() {
            InsightRequestError::Decode(err.to_string())
        } else {
            InsightRequestError::Transport(err.to_string())
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

impl InsightModel for ChatCompletionsModel {
    async fn request_insight(
        &self,
        prompt: &InsightPrompt,
    ) -> Result<RawInsight, InsightRequestError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: &prompt.system,
                },
                Message {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: self.max_tokens,
            stream: false,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            tracing::warn!(
                model = %self.model,
                status = status.as_u16(),
                latency_ms = started.elapsed().as_millis() as u64,
                "Insight model returned non-success status"
            );
            return Err(InsightRequestError::Status {
                status: status.as_u16(),
                body: truncate_chars(&text, 200).to_string(),
            });
        }

        let content = extract_content(&text)?;
        tracing::info!(
            model = %self.model,
            latency_ms = started.elapsed().as_millis() as u64,
            response_chars = content.len(),
            "Insight model responded"
        );
        Ok(RawInsight::new(content))
    }
}

fn extract_content(body: &str) -> Result<String, InsightRequestError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| InsightRequestError::Decode(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(InsightRequestError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"report\":{}}"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), r#"{"report":{}}"#);
    }

    #[test]
    fn empty_choices_are_an_upstream_failure() {
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(InsightRequestError::EmptyResponse)
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[{"message":{"content":"   "}}]}"#),
            Err(InsightRequestError::EmptyResponse)
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(InsightRequestError::EmptyResponse)
        ));
    }

    #[test]
    fn non_json_body_is_a_decode_failure() {
        assert!(matches!(
            extract_content("<html>bad gateway</html>"),
            Err(InsightRequestError::Decode(_))
        ));
    }

    #[test]
    fn request_serializes_as_json_mode_chat() {
        let prompt = InsightPrompt {
            system: "sys".to_string(),
            user: "usr".to_string(),
        };
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                Message {
                    role: "system",
                    content: &prompt.system,
                },
                Message {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: 2000,
            stream: false,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "usr");
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn timeout_error_message_names_the_deadline() {
        let err = InsightRequestError::Timeout(Duration::from_secs(45));
        assert_eq!(err.to_string(), "model request timed out after 45s");
    }
}
