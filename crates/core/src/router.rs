use crate::closing::ClosingVocabulary;
use crate::conversation::ConversationState;
use crate::flows::Role;

/// Picks the role for a pass from the most recent non-blank human turn.
///
/// No human turn at all routes to the expert. A closing phrase, matched on whole words
/// only, routes to the summarizer.
pub fn route(state: &ConversationState, vocabulary: &ClosingVocabulary) -> Role {
    match state.latest_human_text() {
        Some(text) if vocabulary.mentions_closing(text) => Role::Summarizer,
        Some(_) | None => Role::Expert,
    }
}

#[cfg(test)]
mod tests {
    use super::route;
    use crate::closing::ClosingVocabulary;
    use crate::conversation::{ChatTurn, ConversationState};
    use crate::flows::Role;

    fn state_with(texts: &[&str]) -> ConversationState {
        ConversationState::new().with_turns(texts.iter().map(|text| ChatTurn::human(*text)))
    }

    #[test]
    fn empty_state_routes_to_expert() {
        assert_eq!(route(&ConversationState::new(), &ClosingVocabulary::default()), Role::Expert);
        assert_eq!(route(&state_with(&["  "]), &ClosingVocabulary::default()), Role::Expert);
    }

    #[test]
    fn standalone_closing_word_routes_to_summarizer() {
        let vocabulary = ClosingVocabulary::default();

        for text in ["GRACIAS", "Listo, eso es todo", "ok bye", "Thanks a lot", "perfecto."] {
            assert_eq!(route(&state_with(&[text]), &vocabulary), Role::Summarizer, "{text}");
        }
    }

    #[test]
    fn closing_fragment_inside_word_routes_to_expert() {
        let vocabulary = ClosingVocabulary::default();

        for text in ["¿Tienen chauchas?", "Any thanksgiving menu?", "goodbye cake?"] {
            assert_eq!(route(&state_with(&[text]), &vocabulary), Role::Expert, "{text}");
        }
    }

    #[test]
    fn only_the_latest_non_blank_human_turn_counts() {
        let vocabulary = ClosingVocabulary::default();
        let state = state_with(&["gracias", "¿y los postres?", "   "])
            .with_turn(ChatTurn::assistant("Tenemos tiramisú."));

        assert_eq!(route(&state, &vocabulary), Role::Expert);

        let closing = state.with_turn(ChatTurn::human("genial, chau"));
        assert_eq!(route(&closing, &vocabulary), Role::Summarizer);
    }
}
