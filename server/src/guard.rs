use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const FLAGGED_PROMPT_REPLY: &str =
    "I'm sorry this prompt has flagged the security system, please ask something else.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVerdict {
    Allowed,
    Blocked,
}

/// Screens user prompts and model responses
#[async_trait]
pub trait PromptGuard: Send + Sync {
    async fn screen_prompt(&self, prompt: &str) -> Result<PromptVerdict>;

    /// Return the response with sensitive data removed
    async fn sanitize_response(&self, response: &str) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SanitizeUserPromptRequest<'a> {
    user_prompt_data: DataItem<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SanitizeModelResponseRequest<'a> {
    model_response_data: DataItem<'a>,
}

#[derive(Serialize)]
struct DataItem<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SanitizeResponse {
    pub sanitization_result: SanitizationResult,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SanitizationResult {
    pub filter_match_state: String,
    pub filter_results: serde_json::Map<String, serde_json::Value>,
}

impl SanitizationResult {
    pub fn is_match(&self) -> bool {
        self.filter_match_state == "MATCH_FOUND"
    }

    /// De-identified text produced by the sensitive-data filter, if any
    pub fn deidentified_text(&self) -> Option<&str> {
        self.filter_results
            .get("sdp")?
            .pointer("/sdpFilterResult/deidentifyResult/data/text")?
            .as_str()
    }
}

/// Model Armor template client
#[derive(Debug, Clone)]
pub struct ModelArmorGuard {
    client: Client,
    base_url: String,
    template_name: String,
    access_token: Option<String>,
}

impl ModelArmorGuard {
    pub fn new(
        client: Client,
        project: &str,
        location: &str,
        template: &str,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: format!("https://modelarmor.{}.rep.googleapis.com/v1", location),
            template_name: format!(
                "projects/{}/locations/{}/templates/{}",
                project, location, template
            ),
            access_token,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, self.template_name, method)
    }

    async fn call<T: Serialize + Sync>(&self, method: &str, body: &T) -> Result<SanitizationResult> {
        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach Model Armor: {}", e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Model Armor {} failed ({}): {}", method, status, body));
        }

        let parsed: SanitizeResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Model Armor response: {}", e))?;
        Ok(parsed.sanitization_result)
    }
}

#[async_trait]
impl PromptGuard for ModelArmorGuard {
    async fn screen_prompt(&self, prompt: &str) -> Result<PromptVerdict> {
        let body = SanitizeUserPromptRequest {
            user_prompt_data: DataItem { text: prompt },
        };
        let result = self.call("sanitizeUserPrompt", &body).await?;
        debug!(state = %result.filter_match_state, "Prompt screened");

        if result.is_match() {
            warn!("User prompt matched a Model Armor filter");
            Ok(PromptVerdict::Blocked)
        } else {
            Ok(PromptVerdict::Allowed)
        }
    }

    async fn sanitize_response(&self, response: &str) -> Result<String> {
        let body = SanitizeModelResponseRequest {
            model_response_data: DataItem { text: response },
        };
        let result = self.call("sanitizeModelResponse", &body).await?;

        match (result.is_match(), result.deidentified_text()) {
            (true, Some(text)) => {
                warn!("Model response contained sensitive data; returning de-identified text");
                Ok(text.to_string())
            }
            _ => Ok(response.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_url() {
        let guard = ModelArmorGuard::new(
            Client::new(),
            "snow-project",
            "us-central1",
            "ADS_model_armor",
            None,
        );
        assert_eq!(
            guard.method_url("sanitizeUserPrompt"),
            "https://modelarmor.us-central1.rep.googleapis.com/v1/projects/snow-project/locations/us-central1/templates/ADS_model_armor:sanitizeUserPrompt"
        );
    }

    #[test]
    fn test_deidentified_text_is_extracted() {
        let parsed: SanitizeResponse = serde_json::from_value(json!({
            "sanitizationResult": {
                "filterMatchState": "MATCH_FOUND",
                "filterResults": {
                    "sdp": {"sdpFilterResult": {"deidentifyResult": {
                        "matchState": "MATCH_FOUND",
                        "data": {"text": "Call [PHONE_NUMBER] for plowing."}
                    }}}
                }
            }
        }))
        .unwrap();

        let result = parsed.sanitization_result;
        assert!(result.is_match());
        assert_eq!(
            result.deidentified_text(),
            Some("Call [PHONE_NUMBER] for plowing.")
        );
    }

    #[test]
    fn test_no_match_state() {
        let parsed: SanitizeResponse = serde_json::from_value(json!({
            "sanitizationResult": {"filterMatchState": "NO_MATCH_FOUND"}
        }))
        .unwrap();
        assert!(!parsed.sanitization_result.is_match());
        assert!(parsed.sanitization_result.deidentified_text().is_none());
    }

    #[test]
    fn test_request_bodies_use_camel_case() {
        let body = serde_json::to_value(SanitizeUserPromptRequest {
            user_prompt_data: DataItem { text: "hi" },
        })
        .unwrap();
        assert_eq!(body, json!({"userPromptData": {"text": "hi"}}));

        let body = serde_json::to_value(SanitizeModelResponseRequest {
            model_response_data: DataItem { text: "ok" },
        })
        .unwrap();
        assert_eq!(body, json!({"modelResponseData": {"text": "ok"}}));
    }
}
