use anyhow::Result;
use async_trait::async_trait;
use delicia_core::conversation::{ChatTurn, ToolInvocation};
use serde_json::Value;

/// A function the model may call, declared with a JSON-schema argument object.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// Tools are declared but must not be called.
    None,
    /// The model must call one of `allowed`.
    Required { allowed: Vec<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub turns: Vec<ChatTurn>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), tool_calls: Vec::new() }
    }

    pub fn into_turn(self) -> ChatTurn {
        ChatTurn::assistant_with_calls(self.text, self.tool_calls)
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;
}
