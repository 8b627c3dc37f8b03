// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Serialisation error: {0}")]
    Serialisation(String),
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> LlmResult<String>;
}

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-pro-latest";
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct GenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    max_retries: u32,
}

impl GenAiClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        endpoint: Option<String>,
        timeout_seconds: Option<u64>,
        max_retries: Option<u32>,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: DEFAULT_TEMPERATURE,
            timeout,
            max_retries: max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }

    /// Reads `GENAI_API_KEY` and `GENAI_MODEL` from the environment. A missing
    /// key is not a construction error; requests fail with a configuration
    /// error instead so the rest of the system can degrade.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("GENAI_API_KEY").unwrap_or_default(),
            std::env::var("GENAI_MODEL").ok(),
            std::env::var("GENAI_ENDPOINT").ok(),
            None,
            None,
        )
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn build_payload(&self, prompt: &str) -> Value {
        json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": self.temperature
            }
        })
    }

    fn parse_response(response_data: &Value) -> LlmResult<String> {
        response_data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::Provider("Failed to extract content from model response".to_string())
            })
    }

    async fn execute_with_retry(&self, url: &str, payload: &Value) -> LlmResult<Value> {
        let mut last_error = None;
        for _attempt in 0..self.max_retries {
            match tokio::time::timeout(
                self.timeout,
                self.client
                    .post(url)
                    .header("Content-Type", "application/json")
                    .json(payload)
                    .send(),
            )
            .await
            {
                Ok(Ok(response)) => match response.status() {
                    status if status.is_success() => {
                        return response.json().await.map_err(|e| {
                            LlmError::Serialisation(format!("Failed to parse response: {e}"))
                        });
                    }
                    status => {
                        let body = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        last_error = Some(LlmError::Provider(format!(
                            "Model API error {status}: {body}"
                        )));
                        if status.is_client_error() && status.as_u16() != 429 {
                            break;
                        }
                    }
                },
                Ok(Err(e)) => {
                    last_error = Some(LlmError::Network(e.to_string()));
                }
                Err(_) => {
                    last_error = Some(LlmError::Timeout);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| LlmError::Provider("No attempts executed".to_string())))
    }
}

#[async_trait]
impl LlmClient for GenAiClient {
    async fn generate(&self, prompt: &str) -> LlmResult<String> {
        if !self.is_configured() {
            return Err(LlmError::Configuration(
                "GENAI_API_KEY is not set".to_string(),
            ));
        }
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );
        let payload = self.build_payload(prompt);
        let response = self.execute_with_retry(&url, &payload).await?;
        Self::parse_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_prompt_and_temperature() {
        let client = GenAiClient::new("key".to_string(), None, None, None, None);
        let payload = client.build_payload("hello");
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "hello");
        assert!(payload["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn response_parsing_extracts_first_candidate() {
        let response = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "an answer" }] }
            }]
        });
        assert_eq!(GenAiClient::parse_response(&response).unwrap(), "an answer");
    }

    #[test]
    fn malformed_response_is_a_provider_error() {
        let response = json!({ "candidates": [] });
        assert!(matches!(
            GenAiClient::parse_response(&response),
            Err(LlmError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_requests() {
        let client = GenAiClient::new(String::new(), None, None, None, None);
        assert!(matches!(
            client.generate("hi").await,
            Err(LlmError::Configuration(_))
        ));
    }
}
