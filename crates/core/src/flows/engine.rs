use thiserror::Error;

use crate::flows::states::{Role, SessionAction, SessionEvent, SessionNode, TransitionOutcome};

/// Pure transition table for one pass of the conversation graph.
///
/// `Router -> {Expert, Summarize}`, each role loops through `Tools(role)` and back, and
/// a role that proposes nothing it may run ends the pass.
#[derive(Clone, Debug, Default)]
pub struct SessionFlow;

impl SessionFlow {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_state(&self) -> SessionNode {
        SessionNode::Router
    }

    pub fn route_event(role: Role) -> SessionEvent {
        match role {
            Role::Expert => SessionEvent::ContinuingInquiry,
            Role::Summarizer => SessionEvent::ClosingDetected,
        }
    }

    pub fn transition(
        &self,
        current: &SessionNode,
        event: &SessionEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        use SessionAction::{EmitReply, ExecuteTools, InvokeExpert, InvokeSummarizer};
        use SessionEvent::{
            ClosingDetected, ContinuingInquiry, NoToolCallsApproved, ToolCallsApproved,
            ToolResultsAppended,
        };
        use SessionNode::{End, Expert, Router, Summarize, Tools};

        let (to, actions) = match (current, event) {
            (Router, ContinuingInquiry) => (Expert, vec![InvokeExpert]),
            (Router, ClosingDetected) => (Summarize, vec![InvokeSummarizer]),
            (Expert, ToolCallsApproved) => {
                (Tools(Role::Expert), vec![ExecuteTools(Role::Expert)])
            }
            (Summarize, ToolCallsApproved) => {
                (Tools(Role::Summarizer), vec![ExecuteTools(Role::Summarizer)])
            }
            (Expert, NoToolCallsApproved) | (Summarize, NoToolCallsApproved) => {
                (End, vec![EmitReply])
            }
            (Tools(Role::Expert), ToolResultsAppended) => (Expert, vec![InvokeExpert]),
            (Tools(Role::Summarizer), ToolResultsAppended) => (Summarize, vec![InvokeSummarizer]),
            _ => {
                return Err(FlowTransitionError::InvalidTransition {
                    state: *current,
                    event: *event,
                });
            }
        };

        Ok(TransitionOutcome { from: *current, to, event: *event, actions })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: SessionNode, event: SessionEvent },
}
