use serde::{Deserialize, Serialize};

/// The two conversational roles a pass can be routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Expert,
    Summarizer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expert => "expert",
            Self::Summarizer => "summarizer",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionNode {
    Router,
    Expert,
    Summarize,
    Tools(Role),
    End,
}

impl SessionNode {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    ContinuingInquiry,
    ClosingDetected,
    ToolCallsApproved,
    NoToolCallsApproved,
    ToolResultsAppended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionAction {
    InvokeExpert,
    InvokeSummarizer,
    ExecuteTools(Role),
    EmitReply,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: SessionNode,
    pub to: SessionNode,
    pub event: SessionEvent,
    pub actions: Vec<SessionAction>,
}
