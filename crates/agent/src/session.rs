use delicia_core::conversation::{ChatTurn, ConversationState};
use delicia_core::errors::ApplicationError;

use crate::prompts::{DEFAULT_INQUIRY, SESSION_FAREWELL};
use crate::runtime::AgentRuntime;

pub const EXIT_SUMMARY_PREFIX: &str = "El cliente finalizó la conversación. Consultas previas: ";
pub const EXIT_SUMMARY_MAX_CHARS: usize = 1800;

#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// The pass reached `End`; `reply` is what the guest sees.
    Reply { reply: String },
    /// The pass failed; the session stays open.
    Failed { message: String, error: ApplicationError },
    /// An exit command filed the report directly and ended the session.
    Closed { report: String, farewell: String },
}

/// Holds the conversation log across inputs and applies one input at a time.
pub struct SessionDriver {
    runtime: AgentRuntime,
    state: ConversationState,
    closed: bool,
}

impl SessionDriver {
    pub fn new(runtime: AgentRuntime) -> Self {
        Self { runtime, state: ConversationState::new(), closed: false }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn handle_input(&mut self, input: &str) -> TurnOutcome {
        let text = input.trim();
        let state = std::mem::take(&mut self.state).with_turn(ChatTurn::human(text));

        if self.runtime.vocabulary().is_exit_command(text) {
            self.state = state;
            return self.close().await;
        }

        match self.runtime.run_pass(state.clone()).await {
            Ok(outcome) => {
                self.state = outcome.state;
                TurnOutcome::Reply { reply: outcome.reply }
            }
            Err(error) => {
                tracing::error!(
                    event_name = "session.pass.failed",
                    error = %error,
                    step_limit = error.is_step_limit(),
                    "session pass failed"
                );
                self.state = state;
                TurnOutcome::Failed { message: error.user_message().to_string(), error }
            }
        }
    }

    /// Files the session report through the persistence tool without a model call.
    async fn close(&mut self) -> TurnOutcome {
        let inquiry = self.state.initial_inquiry().unwrap_or(DEFAULT_INQUIRY).to_string();
        let summary = exit_summary(&self.state);
        let report = self.runtime.toolbox().save_report(&inquiry, &summary).await;

        tracing::info!(
            event_name = "session.closed",
            human_turns = self.state.human_texts().count(),
            "session closed by exit command"
        );
        self.closed = true;
        TurnOutcome::Closed { report, farewell: SESSION_FAREWELL.to_string() }
    }
}

/// Prefix plus every non-blank human text joined by `"; "`, capped at
/// [`EXIT_SUMMARY_MAX_CHARS`] characters.
pub fn exit_summary(state: &ConversationState) -> String {
    let queries = state.human_texts().collect::<Vec<_>>().join("; ");
    let capped = queries.chars().take(EXIT_SUMMARY_MAX_CHARS).collect::<String>();
    format!("{EXIT_SUMMARY_PREFIX}{capped}")
}
