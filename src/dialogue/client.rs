use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{
    CreatePipeRequest, CreatePipeResponse, DialogueReply, Message, PipeRequest, PipeResponse,
    TurnContext,
};
use super::DialogueGenerator;
use crate::config::{DialogueConfig, RequestConfig};
use crate::error::{DialogueError, DialogueResult};
use crate::prompts::{system_prompt, DIALOGUE_SYSTEM_PROMPT};

/// HTTP client for the dialogue generator pipe
#[derive(Clone)]
pub struct DialogueClient {
    client: Client,
    base_url: String,
    api_key: String,
    pipe: String,
    request_config: RequestConfig,
}

impl DialogueClient {
    /// Create a new dialogue client
    pub fn new(config: &DialogueConfig, request_config: RequestConfig) -> DialogueResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(DialogueError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            pipe: config.pipe.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run the pipe once. No retries: a failed attempt is returned as is.
    pub async fn call_pipe(&self, request: &PipeRequest) -> DialogueResult<PipeResponse> {
        let url = format!("{}/v1/pipes/run", self.base_url);

        debug!(
            pipe = %request.name,
            messages = request.messages.len(),
            "Calling dialogue pipe"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DialogueError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    DialogueError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(DialogueError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let pipe_response: PipeResponse =
            response
                .json()
                .await
                .map_err(|e| DialogueError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        if !pipe_response.success {
            return Err(DialogueError::InvalidResponse {
                message: "Pipe reported an unsuccessful run".to_string(),
            });
        }

        Ok(pipe_response)
    }

    /// Create or update the dialogue pipe definition
    pub async fn ensure_pipe(&self) -> DialogueResult<()> {
        let url = format!("{}/v1/pipes", self.base_url);
        let request = CreatePipeRequest::new(&self.pipe)
            .with_description("Sales prospect persona for role-play training")
            .with_model("openai:gpt-4o-mini")
            .with_upsert(true)
            .with_json_output(true)
            .with_temperature(0.8)
            .with_max_tokens(1200)
            .with_messages(vec![Message::system(DIALOGUE_SYSTEM_PROMPT)]);

        info!(pipe = %self.pipe, "Ensuring dialogue pipe exists");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(DialogueError::Http)?;

        let status = response.status();

        if status.as_u16() == 409 {
            info!(pipe = %self.pipe, "Pipe already exists");
            return Ok(());
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(DialogueError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let created: CreatePipeResponse =
            response
                .json()
                .await
                .map_err(|e| DialogueError::InvalidResponse {
                    message: format!("Failed to parse create pipe response: {}", e),
                })?;

        info!(pipe = %created.name, url = ?created.url, "Dialogue pipe ready");
        Ok(())
    }

    /// Build messages for a turn
    fn build_messages(&self, context: &TurnContext) -> DialogueResult<Vec<Message>> {
        let payload =
            serde_json::to_string(context).map_err(|e| DialogueError::InvalidResponse {
                message: format!("Failed to encode turn context: {}", e),
            })?;

        let instruction = if context.is_opening() {
            "Open the conversation in character."
        } else {
            "Respond in character to the trainee's latest line."
        };

        Ok(vec![
            Message::system(system_prompt(context.is_cold_outreach)),
            Message::user(format!("{}\n\nContext:\n{}", instruction, payload)),
        ])
    }
}

#[async_trait]
impl DialogueGenerator for DialogueClient {
    async fn generate(&self, context: &TurnContext) -> DialogueResult<DialogueReply> {
        let start = Instant::now();
        let messages = self.build_messages(context)?;
        let mut request =
            PipeRequest::new(&self.pipe, messages).with_variable("track", &context.track_key);
        if let Some(channel) = context.channel {
            request = request.with_variable("channel", channel.as_str());
        }

        let result = self
            .call_pipe(&request)
            .await
            .and_then(|response| DialogueReply::from_completion(&response.completion));

        let latency = start.elapsed();
        match &result {
            Ok(reply) => info!(
                pipe = %self.pipe,
                stage = %context.stage.key,
                options = reply.options.len(),
                latency_ms = latency.as_millis(),
                "Dialogue turn generated"
            ),
            Err(e) => warn!(
                pipe = %self.pipe,
                stage = %context.stage.key,
                error = %e,
                latency_ms = latency.as_millis(),
                "Dialogue generation failed"
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = DialogueConfig {
            api_key: "test_key".to_string(),
            base_url: "https://api.langbase.com/".to_string(),
            pipe: "dialogue-test".to_string(),
        };

        let client = DialogueClient::new(&config, RequestConfig::default()).unwrap();
        assert_eq!(client.base_url(), "https://api.langbase.com");
    }
}
