//! Stateful chat session on top of a [`ChatModel`].
//!
//! The session owns the conversation history and the fixed per-session
//! configuration (system instruction and declared tools). History is bounded:
//! once more than `max_turns` exchanges are held, the oldest exchange is
//! evicted as a whole, so the history always opens with a user turn.

use tracing::debug;

use crate::client::ChatModel;
use crate::errors::GeminiResult;
use crate::types::*;

pub const DEFAULT_MAX_TURNS: usize = 10;

/// A conversation with the hosted model
#[derive(Debug, Clone)]
pub struct ChatSession {
    history: Vec<Content>,
    system_instruction: Option<String>,
    tools: Vec<Tool>,
    generation_config: Option<GenerationConfig>,
    max_turns: usize,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            system_instruction: None,
            tools: Vec::new(),
            generation_config: None,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    /// Cap on retained exchanges; values below one are treated as one
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Send a user message and record the exchange.
    ///
    /// History is only updated when the model answers; a failed send leaves it untouched.
    pub async fn send_message(
        &mut self,
        model: &dyn ChatModel,
        text: &str,
    ) -> GeminiResult<GenerateContentResponse> {
        let user_content = Content::user(text);
        let request = self.build_request(&user_content);

        let response = model.generate_content(request).await?;

        self.history.push(user_content);
        if let Some(content) = response.first_content() {
            let mut content = content.clone();
            if content.role.is_none() {
                content.role = Some(ROLE_MODEL.to_string());
            }
            self.history.push(content);
        }
        self.trim_history();

        Ok(response)
    }

    fn build_request(&self, next: &Content) -> GenerateContentRequest {
        let mut contents = self.history.clone();
        contents.push(next.clone());

        GenerateContentRequest {
            contents,
            system_instruction: self.system_instruction.as_ref().map(|prompt| Content {
                parts: vec![Part::text(prompt.clone())],
                role: None,
            }),
            tools: if self.tools.is_empty() {
                None
            } else {
                Some(self.tools.clone())
            },
            generation_config: self.generation_config.clone(),
        }
    }

    fn trim_history(&mut self) {
        while self.turn_count() > self.max_turns {
            let next_user = self
                .history
                .iter()
                .skip(1)
                .position(Content::is_user)
                .map(|i| i + 1)
                .unwrap_or(self.history.len());
            self.history.drain(..next_user);
            debug!(
                remaining = self.history.len(),
                "Evicted oldest exchange from chat history"
            );
        }
    }

    /// Number of exchanges (user turns) currently held
    pub fn turn_count(&self) -> usize {
        self.history.iter().filter(|c| c.is_user()).count()
    }

    /// Get the full conversation history.
    pub fn history(&self) -> &[Content] {
        &self.history
    }
}
