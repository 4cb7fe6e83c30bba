use std::sync::Arc;

use anyhow::Result;
use delicia_core::actions::ToolKind;
use delicia_core::conversation::{ChatTurn, ConversationState};
use delicia_core::flows::Role;

use crate::llm::{ChatRequest, LlmClient, ToolChoice};
use crate::prompts::{
    summarizer_system_prompt, DEFAULT_INQUIRY, EXPERT_SYSTEM_PROMPT, FALLBACK_FAREWELL_PROMPT,
    NO_CUSTOMER_FAREWELL_PROMPT, REPORT_ATTEMPTED_FAREWELL_PROMPT, SUMMARIZER_INSTRUCTION,
};
use crate::tools::specs_for;

/// The expert and summarizer model calls. Each takes the state and returns it with the
/// model's assistant turn appended.
#[derive(Clone)]
pub struct Roles {
    llm: Arc<dyn LlmClient>,
}

impl Roles {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn expert(&self, state: ConversationState) -> Result<ConversationState> {
        let request = ChatRequest {
            system: EXPERT_SYSTEM_PROMPT.to_string(),
            turns: state.turns().to_vec(),
            tools: specs_for(Role::Expert),
            tool_choice: ToolChoice::Auto,
        };
        let response = self.llm.complete(request).await?;
        Ok(state.with_turn(response.into_turn()))
    }

    /// `report_attempted` is set once the summarizer proposed the persistence tool in the
    /// current pass, whether the call ran or was rejected; it then only says goodbye.
    pub async fn summarizer(
        &self,
        state: ConversationState,
        report_attempted: bool,
    ) -> Result<ConversationState> {
        if report_attempted {
            let turn =
                self.farewell(REPORT_ATTEMPTED_FAREWELL_PROMPT, state.turns().to_vec()).await?;
            return Ok(state.with_turn(turn));
        }

        if !state.has_human_turn() {
            tracing::info!(
                event_name = "session.summarizer.no_customer",
                "no customer messages; farewell without report"
            );
            let turn = self.farewell(NO_CUSTOMER_FAREWELL_PROMPT, Vec::new()).await?;
            return Ok(state.with_turn(turn));
        }

        let inquiry = state.initial_inquiry().unwrap_or(DEFAULT_INQUIRY);
        let request = ChatRequest {
            system: summarizer_system_prompt(inquiry, &state.transcript()),
            turns: vec![ChatTurn::human(SUMMARIZER_INSTRUCTION)],
            tools: specs_for(Role::Summarizer),
            tool_choice: ToolChoice::Required {
                allowed: vec![ToolKind::SaveReport.name().to_string()],
            },
        };

        match self.llm.complete(request).await {
            Ok(response) => Ok(state.with_turn(response.into_turn())),
            Err(error) => {
                tracing::warn!(
                    event_name = "session.summarizer.fallback",
                    error = %format!("{error:#}"),
                    "forced summary call failed; falling back to a plain farewell"
                );
                let turn = self.farewell(FALLBACK_FAREWELL_PROMPT, Vec::new()).await?;
                Ok(state.with_turn(turn))
            }
        }
    }

    async fn farewell(&self, instruction: &str, turns: Vec<ChatTurn>) -> Result<ChatTurn> {
        let request = ChatRequest {
            system: instruction.to_string(),
            turns,
            tools: specs_for(Role::Summarizer),
            tool_choice: ToolChoice::None,
        };
        Ok(self.llm.complete(request).await?.into_turn())
    }
}
