use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role used for user-authored content
pub const ROLE_USER: &str = "user";
/// Role used for model-authored content
pub const ROLE_MODEL: &str = "model";

/// Function call from LLM response
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(rename = "args", default)]
    pub arguments: Map<String, Value>,
}

impl FunctionCall {
    /// Look up a string argument by key
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Request to Gemini API to generate content
#[derive(Serialize, Debug, Clone)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// Tool definition for Gemini API
#[derive(Serialize, Debug, Clone)]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// Function declaration for Gemini API
#[derive(Serialize, Debug, Clone)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
}

/// Content structure for requests and responses
#[derive(Serialize, Clone, Debug, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Content {
    /// A single-part user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            role: Some(ROLE_USER.to_string()),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.as_deref() == Some(ROLE_USER)
    }
}

/// Part structure for a piece of content
#[derive(Serialize, Clone, Debug, Deserialize, Default, PartialEq)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_call: None,
        }
    }

    pub fn function_call(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            text: None,
            function_call: Some(FunctionCall {
                name: name.into(),
                arguments,
            }),
        }
    }
}

/// Generation configuration options
#[derive(Serialize, Debug, Default, Clone)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response from Gemini API
#[derive(Deserialize, Debug, Serialize, Clone, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// Candidate in the response
#[derive(Deserialize, Debug, Serialize, Clone)]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(rename = "finishReason", skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Build a response holding a single model candidate with the given parts
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts,
                    role: Some(ROLE_MODEL.to_string()),
                }),
                finish_reason: None,
            }],
        }
    }

    /// Content of the first candidate, if any
    pub fn first_content(&self) -> Option<&Content> {
        self.candidates.first().and_then(|c| c.content.as_ref())
    }

    /// The function call carried by the first part of the first candidate.
    ///
    /// Later parts are never inspected, so at most one call is serviced per turn.
    pub fn leading_function_call(&self) -> Option<&FunctionCall> {
        self.first_content()
            .and_then(|content| content.parts.first())
            .and_then(|part| part.function_call.as_ref())
    }

    /// Concatenated text of the first candidate's parts
    pub fn text(&self) -> Option<String> {
        let content = self.first_content()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}
