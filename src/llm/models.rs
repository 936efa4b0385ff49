use anyhow::anyhow;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request
//
// Chat-completions request with a single system turn and a single user turn:
//
//   { "model": "gpt-3.5-turbo",
//     "messages": [ { "role": "system", "content": "..." },
//                   { "role": "user",   "content": "..." } ] }
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
}

impl<'a> ChatCompletionRequest<'a> {
    pub fn single_turn(model: &'a str, system: &'a str, user: &'a str) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage { role: Role::System, content: system },
                ChatMessage { role: Role::User, content: user },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Response
//
// Success:
//   { "id": "...", "choices": [ { "index": 0,
//       "message": { "role": "assistant", "content": "..." },
//       "finish_reason": "stop" } ], ... }
//
// Failure (non-2xx status):
//   { "error": { "message": "...", "type": "...", "code": "..." } }
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, whitespace-trimmed.
    ///
    /// A response without choices or without message content is an error.
    pub fn into_text(self) -> anyhow::Result<String> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("chat completion returned no choices"))?;
        let content = choice
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| anyhow!("chat completion choice has no message content"))?;
        Ok(content.trim().to_owned())
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{} ({kind})", self.message),
            None => f.write_str(&self.message),
        }
    }
}
