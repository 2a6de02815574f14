use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::errors::{GeminiError, GeminiResult};
use crate::types::*;

/// Anything that can turn a `GenerateContentRequest` into a model response.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse>;
}

/// Client for interacting with the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

impl GeminiClient {
    /// Create a new Gemini API client
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GeminiError::ConfigError(
                "API key is required to initialize the Gemini client".to_string(),
            )
        })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs.unwrap_or(60)))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Get the generateContent URL for the configured model
    fn get_base_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.config.api_base(),
            self.config.model_name(),
            self.api_key
        )
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    /// Generate content using the Gemini API
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        let url = self.get_base_url();
        debug!(
            model = self.config.model_name(),
            turns = request.contents.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GeminiError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.map_err(|e| {
                GeminiError::ResponseError(format!("Failed to read error response: {}", e))
            })?;

            return Err(GeminiError::HttpError {
                status_code: status.as_u16(),
                message: format!("API request failed: {}", error_body),
            });
        }

        let response_body = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GeminiError::ParsingError(format!("Failed to parse response: {}", e)))?;

        Ok(response_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let result = GeminiClient::new(GeminiConfig::default());
        assert!(matches!(result, Err(GeminiError::ConfigError(_))));
    }

    #[test]
    fn test_url_uses_model_and_base() {
        let config = GeminiConfig {
            api_key: Some("secret".to_string()),
            api_base: Some("http://127.0.0.1:9999/v1beta".to_string()),
            ..GeminiConfig::default()
        };
        let client = GeminiClient::new(config).unwrap();
        assert_eq!(
            client.get_base_url(),
            "http://127.0.0.1:9999/v1beta/models/gemini-2.5-flash:generateContent?key=secret"
        );
    }
}
