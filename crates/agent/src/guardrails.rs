use delicia_core::actions::ToolKind;
use delicia_core::conversation::{ChatTurn, ConversationState, ToolInvocation};
use delicia_core::flows::{Role, SessionEvent};

use crate::tools::{ToolCall, ToolCallError};

/// Verdict for one proposed invocation inside an approved batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationVerdict {
    Execute { invocation: ToolInvocation, call: ToolCall },
    Reject { invocation: ToolInvocation, reason_code: &'static str, message: String },
}

impl InvocationVerdict {
    pub fn invocation(&self) -> &ToolInvocation {
        match self {
            Self::Execute { invocation, .. } | Self::Reject { invocation, .. } => invocation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// At least one proposed tool is on the role's allow-list. Every invocation gets a verdict.
    Approve { verdicts: Vec<InvocationVerdict> },
    /// Nothing runs; the pass ends.
    Finish { reason_code: &'static str },
}

impl GateDecision {
    pub fn event(&self) -> SessionEvent {
        match self {
            Self::Approve { .. } => SessionEvent::ToolCallsApproved,
            Self::Finish { .. } => SessionEvent::NoToolCallsApproved,
        }
    }
}

/// Decides whether the latest assistant turn may run tools for `role`.
#[derive(Clone, Debug, Default)]
pub struct ToolGate;

impl ToolGate {
    pub fn evaluate(&self, role: Role, state: &ConversationState) -> GateDecision {
        let invocations = match state.last() {
            Some(ChatTurn::Assistant { tool_calls, .. }) if !tool_calls.is_empty() => tool_calls,
            _ => return GateDecision::Finish { reason_code: "no_tool_calls" },
        };

        let any_allowed = invocations.iter().any(|invocation| {
            ToolKind::from_name(&invocation.name).is_some_and(|kind| kind.allowed_for(role))
        });
        if !any_allowed {
            return GateDecision::Finish { reason_code: "no_allowed_tool_calls" };
        }

        GateDecision::Approve {
            verdicts: invocations.iter().map(|invocation| verdict(role, invocation)).collect(),
        }
    }
}

fn verdict(role: Role, invocation: &ToolInvocation) -> InvocationVerdict {
    let reject = |reason_code, message: String| InvocationVerdict::Reject {
        invocation: invocation.clone(),
        reason_code,
        message,
    };

    match ToolCall::parse(invocation) {
        Ok(call) if call.kind().allowed_for(role) => {
            InvocationVerdict::Execute { invocation: invocation.clone(), call }
        }
        Ok(_) => reject(
            "tool_not_allowed",
            format!("Error: la herramienta '{}' no está permitida en este paso.", invocation.name),
        ),
        Err(error @ ToolCallError::UnknownTool(_)) => {
            reject("unknown_tool", format!("Error: {error}."))
        }
        Err(error @ ToolCallError::MissingArgument { .. }) => {
            reject("invalid_arguments", format!("Error: {error}."))
        }
    }
}

#[cfg(test)]
mod tests {
    use delicia_core::conversation::{ChatTurn, ConversationState, ToolInvocation};
    use delicia_core::flows::{Role, SessionEvent};
    use serde_json::json;

    use super::{GateDecision, InvocationVerdict, ToolGate};
    use crate::tools::ToolCall;

    fn proposing(calls: Vec<ToolInvocation>) -> ConversationState {
        ConversationState::new()
            .with_turn(ChatTurn::human("¿Qué postres tienen?"))
            .with_turn(ChatTurn::assistant_with_calls("", calls))
    }

    #[test]
    fn plain_reply_finishes_the_pass() {
        let state = ConversationState::new()
            .with_turn(ChatTurn::human("hola"))
            .with_turn(ChatTurn::assistant("¡Bienvenido a La Delicia!"));

        let decision = ToolGate.evaluate(Role::Expert, &state);
        assert_eq!(decision, GateDecision::Finish { reason_code: "no_tool_calls" });
        assert_eq!(decision.event(), SessionEvent::NoToolCallsApproved);
    }

    #[test]
    fn expert_proposing_only_persistence_is_not_executed() {
        let state = proposing(vec![ToolInvocation::new(
            "c1",
            "guardar_informe_en_notion",
            json!({"initial_inquiry": "x", "summary": "y"}),
        )]);

        assert_eq!(
            ToolGate.evaluate(Role::Expert, &state),
            GateDecision::Finish { reason_code: "no_allowed_tool_calls" }
        );
    }

    #[test]
    fn summarizer_cannot_search_the_menu() {
        let state = proposing(vec![ToolInvocation::new(
            "c1",
            "consultar_menu_y_horarios",
            json!({"query": "postres"}),
        )]);

        assert!(matches!(ToolGate.evaluate(Role::Summarizer, &state), GateDecision::Finish { .. }));
    }

    #[test]
    fn mixed_batch_executes_allowed_and_rejects_the_rest() {
        let state = proposing(vec![
            ToolInvocation::new("c1", "consultar_menu_y_horarios", json!({"query": "postres"})),
            ToolInvocation::new("c2", "guardar_informe_en_notion", json!({"summary": "y"})),
            ToolInvocation::new("c3", "borrar_todo", json!({})),
            ToolInvocation::new("c4", "consultar_menu_y_horarios", json!({})),
        ]);

        let GateDecision::Approve { verdicts } = ToolGate.evaluate(Role::Expert, &state) else {
            panic!("expected approval");
        };

        assert_eq!(verdicts.len(), 4);
        assert_eq!(
            verdicts[0],
            InvocationVerdict::Execute {
                invocation: ToolInvocation::new(
                    "c1",
                    "consultar_menu_y_horarios",
                    json!({"query": "postres"})
                ),
                call: ToolCall::MenuLookup { query: "postres".to_string() },
            }
        );
        let reasons = verdicts
            .iter()
            .skip(1)
            .map(|verdict| match verdict {
                InvocationVerdict::Reject { reason_code, .. } => *reason_code,
                InvocationVerdict::Execute { .. } => "executed",
            })
            .collect::<Vec<_>>();
        assert_eq!(reasons, vec!["tool_not_allowed", "unknown_tool", "invalid_arguments"]);
        assert_eq!(verdicts[2].invocation().id, "c3");
    }

    #[test]
    fn only_the_latest_turn_is_considered() {
        let state = proposing(vec![ToolInvocation::new("c1", "off_topic_tool", json!({}))])
            .with_turn(ChatTurn::tool_result("c1", "off_topic_tool", "Disculpe"))
            .with_turn(ChatTurn::assistant("¿Algo más?"));

        assert!(matches!(ToolGate.evaluate(Role::Expert, &state), GateDecision::Finish { .. }));
    }
}
