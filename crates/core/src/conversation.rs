//! Append-only conversation log shared by the router, the roles and the tool step.
//!
//! Every step takes a [`ConversationState`] by value and hands back the same log with
//! new turns appended. Turns are never removed or reordered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const HUMAN_LABEL: &str = "Cliente";
pub const ASSISTANT_LABEL: &str = "Bruno";
pub const TOOL_LABEL: &str = "Herramienta";

/// A tool call proposed by the model on an assistant turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self { id: id.into(), name: name.into(), arguments }
    }

    /// String argument lookup; missing keys and non-string values read as `None`.
    pub fn string_argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatTurn {
    Human {
        text: String,
    },
    Assistant {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolInvocation>,
    },
    ToolResult { call_id: String, tool_name: String, text: String },
}

impl ChatTurn {
    pub fn human(text: impl Into<String>) -> Self {
        Self::Human { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { text: text.into(), tool_calls: Vec::new() }
    }

    pub fn assistant_with_calls(text: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self::Assistant { text: text.into(), tool_calls }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::ToolResult { call_id: call_id.into(), tool_name: tool_name.into(), text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Human { text } | Self::Assistant { text, .. } | Self::ToolResult { text, .. } => {
                text
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human { .. })
    }

    pub fn tool_calls(&self) -> &[ToolInvocation] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            Self::Human { .. } | Self::ToolResult { .. } => &[],
        }
    }

    pub fn speaker_label(&self) -> String {
        match self {
            Self::Human { .. } => HUMAN_LABEL.to_string(),
            Self::Assistant { .. } => ASSISTANT_LABEL.to_string(),
            Self::ToolResult { tool_name, .. } => format!("{TOOL_LABEL} {tool_name}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    turns: Vec<ChatTurn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_turn(mut self, turn: ChatTurn) -> Self {
        self.turns.push(turn);
        self
    }

    #[must_use]
    pub fn with_turns(mut self, turns: impl IntoIterator<Item = ChatTurn>) -> Self {
        self.turns.extend(turns);
        self
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn human_texts(&self) -> impl Iterator<Item = &str> {
        self.turns
            .iter()
            .filter(|turn| turn.is_human() && !turn.is_blank())
            .map(|turn| turn.text().trim())
    }

    pub fn has_human_turn(&self) -> bool {
        self.human_texts().next().is_some()
    }

    pub fn latest_human_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.is_human() && !turn.is_blank())
            .map(|turn| turn.text().trim())
    }

    /// First non-blank human text; this is the inquiry filed with the session report.
    pub fn initial_inquiry(&self) -> Option<&str> {
        self.human_texts().next()
    }

    pub fn latest_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| matches!(turn, ChatTurn::Assistant { .. }) && !turn.is_blank())
            .map(ChatTurn::text)
    }

    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .filter(|turn| !turn.is_blank())
            .map(|turn| format!("{}: {}", turn.speaker_label(), turn.text().trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ChatTurn, ConversationState, ToolInvocation};

    fn sample_state() -> ConversationState {
        ConversationState::new()
            .with_turn(ChatTurn::human("   "))
            .with_turn(ChatTurn::human("¿Tienen opciones vegetarianas?"))
            .with_turn(ChatTurn::assistant_with_calls(
                "",
                vec![ToolInvocation::new(
                    "call-1",
                    "consultar_menu_y_horarios",
                    json!({"query": "vegetariano"}),
                )],
            ))
            .with_turn(ChatTurn::tool_result("call-1", "consultar_menu_y_horarios", "Risotto"))
            .with_turn(ChatTurn::assistant("Tenemos el Risotto de Hongos."))
            .with_turn(ChatTurn::human("perfecto, gracias"))
    }

    #[test]
    fn appending_preserves_order_and_existing_turns() {
        let before = ConversationState::new().with_turn(ChatTurn::human("hola"));
        let after = before.clone().with_turn(ChatTurn::assistant("¡Bienvenido!"));

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
        assert_eq!(&after.turns()[..1], before.turns());
        assert_eq!(after.last(), Some(&ChatTurn::assistant("¡Bienvenido!")));
    }

    #[test]
    fn initial_inquiry_skips_blank_human_turns() {
        let state = sample_state();

        assert_eq!(state.initial_inquiry(), Some("¿Tienen opciones vegetarianas?"));
        assert_eq!(state.latest_human_text(), Some("perfecto, gracias"));
        assert_eq!(state.latest_assistant_text(), Some("Tenemos el Risotto de Hongos."));
    }

    #[test]
    fn blank_only_state_has_no_human_turn() {
        let state = ConversationState::new().with_turn(ChatTurn::human("  \n"));

        assert!(!state.has_human_turn());
        assert_eq!(state.initial_inquiry(), None);
        assert_eq!(state.latest_human_text(), None);
    }

    #[test]
    fn transcript_labels_non_blank_turns_by_speaker() {
        let transcript = sample_state().transcript();
        let lines = transcript.lines().collect::<Vec<_>>();

        assert_eq!(
            lines,
            vec![
                "Cliente: ¿Tienen opciones vegetarianas?",
                "Herramienta consultar_menu_y_horarios: Risotto",
                "Bruno: Tenemos el Risotto de Hongos.",
                "Cliente: perfecto, gracias",
            ]
        );
    }

    #[test]
    fn turns_serialize_with_role_tag() {
        let value = serde_json::to_value(ChatTurn::human("hola")).expect("serialize turn");
        assert_eq!(value, json!({"role": "human", "text": "hola"}));

        let invocation = ToolInvocation::new("c", "off_topic_tool", json!({"n": 1}));
        assert_eq!(invocation.string_argument("n"), None);
        assert_eq!(invocation.string_argument("missing"), None);
    }
}
