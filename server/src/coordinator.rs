use crate::dispatcher::ToolDispatcher;
use crate::guard::{PromptGuard, PromptVerdict, FLAGGED_PROMPT_REPLY};
use ads_core::chat::ChatSession;
use ads_core::client::ChatModel;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rendered in place of a lookup that produced no data
pub const NO_CONTEXT: &str = "None";
pub const EMPTY_RESPONSE_REPLY: &str = "An unknown error has occured.";

/// Second-turn prompt carrying the tool result back to the model
pub fn build_final_prompt(user_text: &str, context: Option<&str>) -> String {
    format!("{}\nContext: {}", user_text, context.unwrap_or(NO_CONTEXT))
}

/// Drives one user message through the model, servicing at most one tool call
pub struct Coordinator {
    model: Arc<dyn ChatModel>,
    dispatcher: ToolDispatcher,
    guard: Option<Arc<dyn PromptGuard>>,
}

impl Coordinator {
    pub fn new(model: Arc<dyn ChatModel>, dispatcher: ToolDispatcher) -> Self {
        Self {
            model,
            dispatcher,
            guard: None,
        }
    }

    pub fn with_guard(mut self, guard: Arc<dyn PromptGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Process a single message from the user
    pub async fn process_message(&self, session: &mut ChatSession, user_text: &str) -> Result<String> {
        if let Some(guard) = &self.guard {
            let verdict = guard
                .screen_prompt(user_text)
                .await
                .context("Failed to screen user prompt")?;
            if verdict == PromptVerdict::Blocked {
                return Ok(FLAGGED_PROMPT_REPLY.to_string());
            }
        }
        info!(text = user_text, "User message");

        let mut response = session
            .send_message(self.model.as_ref(), user_text)
            .await
            .context("Failed to get response from model")?;

        if let Some(call) = response.leading_function_call().cloned() {
            info!(function = %call.name, args = ?call.arguments, "Function call requested");

            let context = self.dispatcher.dispatch(&call).await;
            let final_prompt = build_final_prompt(user_text, context.as_deref());
            debug!(prompt_len = final_prompt.len(), "Sending prompt with tool context");

            response = session
                .send_message(self.model.as_ref(), &final_prompt)
                .await
                .context("Failed to get response from model after tool call")?;

            if let Some(chained) = response.leading_function_call() {
                warn!(function = %chained.name, "Ignoring chained function call");
            }
        }

        let text = self.finish(response.text().unwrap_or_default()).await?;
        info!(response = %text, "AI response");
        Ok(text)
    }

    async fn finish(&self, text: String) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(EMPTY_RESPONSE_REPLY.to_string());
        }
        match &self.guard {
            Some(guard) => guard
                .sanitize_response(&text)
                .await
                .context("Failed to sanitize model response"),
            None => Ok(text),
        }
    }
}
