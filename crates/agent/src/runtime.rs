use delicia_core::actions::ToolKind;
use delicia_core::closing::ClosingVocabulary;
use delicia_core::conversation::{ChatTurn, ConversationState};
use delicia_core::errors::{ApplicationError, DomainError};
use delicia_core::flows::{Role, SessionAction, SessionEvent, SessionFlow, SessionNode};
use delicia_core::router::route;

use crate::guardrails::{GateDecision, InvocationVerdict, ToolGate};
use crate::prompts::{DEFAULT_INQUIRY, NO_TEXT_REPLY};
use crate::roles::Roles;
use crate::tools::Toolbox;

#[derive(Clone, Debug, PartialEq)]
pub struct PassOutcome {
    pub state: ConversationState,
    pub reply: String,
    pub route: Role,
    pub steps: usize,
    pub tool_executions: usize,
}

/// Drives one pass of the session state machine from `Router` to `End`.
#[derive(Clone)]
pub struct AgentRuntime {
    flow: SessionFlow,
    vocabulary: ClosingVocabulary,
    gate: ToolGate,
    roles: Roles,
    toolbox: Toolbox,
    step_limit: usize,
}

impl AgentRuntime {
    pub fn new(
        roles: Roles,
        toolbox: Toolbox,
        vocabulary: ClosingVocabulary,
        step_limit: usize,
    ) -> Self {
        Self { flow: SessionFlow::new(), vocabulary, gate: ToolGate, roles, toolbox, step_limit }
    }

    pub fn vocabulary(&self) -> &ClosingVocabulary {
        &self.vocabulary
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    pub async fn run_pass(
        &self,
        mut state: ConversationState,
    ) -> Result<PassOutcome, ApplicationError> {
        let mut steps = 0;
        let mut tool_executions = 0;
        let mut report_attempted = false;
        let mut reply = None;

        let router = self.flow.initial_state();
        self.take_step(&mut steps, router)?;
        let route_taken = route(&state, &self.vocabulary);
        tracing::info!(
            event_name = "session.router.decided",
            role = route_taken.as_str(),
            "router decided"
        );
        let mut outcome = self
            .flow
            .transition(&router, &SessionFlow::route_event(route_taken))
            .map_err(DomainError::from)?;

        loop {
            let mut next_event = None;
            for action in outcome.actions.iter().copied() {
                match action {
                    SessionAction::InvokeExpert => {
                        self.take_step(&mut steps, outcome.to)?;
                        state = self.roles.expert(state).await.map_err(integration)?;
                        next_event = Some(self.gate_event(Role::Expert, &state));
                    }
                    SessionAction::InvokeSummarizer => {
                        self.take_step(&mut steps, outcome.to)?;
                        state = self
                            .roles
                            .summarizer(state, report_attempted)
                            .await
                            .map_err(integration)?;
                        next_event = Some(self.gate_event(Role::Summarizer, &state));
                    }
                    SessionAction::ExecuteTools(role) => {
                        self.take_step(&mut steps, outcome.to)?;
                        let batch = self.run_tools(role, state).await?;
                        state = batch.state;
                        tool_executions += batch.executed;
                        report_attempted |= batch.report_attempted;
                        next_event = Some(SessionEvent::ToolResultsAppended);
                    }
                    SessionAction::EmitReply => reply = Some(reply_text(&state)),
                }
            }

            let Some(event) = next_event else { break };
            outcome = self.flow.transition(&outcome.to, &event).map_err(DomainError::from)?;
        }

        let reply = match reply {
            Some(reply) if outcome.to.is_terminal() => reply,
            _ => {
                return Err(DomainError::InvariantViolation(
                    "pass stopped before reaching the end state".to_string(),
                )
                .into())
            }
        };
        tracing::debug!(
            event_name = "session.pass.completed",
            steps,
            tool_executions,
            "session pass completed"
        );
        Ok(PassOutcome { state, reply, route: route_taken, steps, tool_executions })
    }

    fn take_step(&self, steps: &mut usize, node: SessionNode) -> Result<(), ApplicationError> {
        *steps += 1;
        if *steps > self.step_limit {
            tracing::warn!(
                event_name = "session.pass.step_limit",
                limit = self.step_limit,
                node = ?node,
                "session pass exceeded step limit"
            );
            return Err(DomainError::StepLimitExceeded { limit: self.step_limit }.into());
        }
        Ok(())
    }

    fn gate_event(&self, role: Role, state: &ConversationState) -> SessionEvent {
        let decision = self.gate.evaluate(role, state);
        if let GateDecision::Finish { reason_code } = &decision {
            tracing::debug!(
                event_name = "session.tools.gated",
                role = role.as_str(),
                reason_code,
                "no tools approved"
            );
        }
        decision.event()
    }

    /// Appends one tool-result turn per proposed invocation, in proposal order. A proposed
    /// report counts as attempted whether it ran or was rejected.
    async fn run_tools(
        &self,
        role: Role,
        state: ConversationState,
    ) -> Result<ToolBatch, ApplicationError> {
        let GateDecision::Approve { verdicts } = self.gate.evaluate(role, &state) else {
            return Err(DomainError::InvariantViolation(
                "tools step entered without approved tool calls".to_string(),
            )
            .into());
        };

        let fallback_inquiry = state.initial_inquiry().unwrap_or(DEFAULT_INQUIRY).to_string();
        let mut results = Vec::with_capacity(verdicts.len());
        let mut executed = 0;
        let mut report_attempted = false;

        for verdict in &verdicts {
            let invocation = verdict.invocation();
            report_attempted |= role == Role::Summarizer
                && ToolKind::from_name(&invocation.name) == Some(ToolKind::SaveReport);
            let text = match verdict {
                InvocationVerdict::Execute { call, .. } => {
                    executed += 1;
                    tracing::info!(
                        event_name = "session.tools.executed",
                        role = role.as_str(),
                        tool = %invocation.name,
                        "executing tool"
                    );
                    self.toolbox.execute(call, &fallback_inquiry).await.map_err(integration)?
                }
                InvocationVerdict::Reject { reason_code, message, .. } => {
                    tracing::warn!(
                        event_name = "session.tools.rejected",
                        role = role.as_str(),
                        tool = %invocation.name,
                        reason_code,
                        "tool invocation rejected"
                    );
                    message.clone()
                }
            };
            results.push(ChatTurn::tool_result(&invocation.id, &invocation.name, text));
        }

        Ok(ToolBatch { state: state.with_turns(results), executed, report_attempted })
    }
}

struct ToolBatch {
    state: ConversationState,
    executed: usize,
    report_attempted: bool,
}

fn integration(error: anyhow::Error) -> ApplicationError {
    ApplicationError::Integration(format!("{error:#}"))
}

/// Text of the final turn, else the latest assistant text, else a fixed placeholder.
pub fn reply_text(state: &ConversationState) -> String {
    state
        .last()
        .filter(|turn| !turn.is_blank())
        .map(|turn| turn.text().trim())
        .or_else(|| state.latest_assistant_text().map(str::trim))
        .unwrap_or(NO_TEXT_REPLY)
        .to_string()
}
