//! The one vocabulary of closing phrases.
//!
//! The router uses it to spot a farewell anywhere in a message (whole words only) and the
//! input loop uses it to recognise a bare exit command. Both read the same list.

use regex::Regex;

use crate::errors::DomainError;

/// Phrases that end the conversation, in the languages the guests actually use.
pub const DEFAULT_CLOSING_PHRASES: &[&str] = &[
    "gracias",
    "listo",
    "eso es todo",
    "chau",
    "salir",
    "perfecto",
    "thanks",
    "thank you",
    "that's all",
    "bye",
    "done",
    "perfect",
];

/// Commands that always end the session when typed on their own.
pub const EXIT_COMMANDS: &[&str] = &["exit", "quit"];

const EDGE_PUNCTUATION: &[char] = &['.', '!', '?', '¡', '¿', ',', ';', ':'];

#[derive(Clone, Debug)]
pub struct ClosingVocabulary {
    phrases: Vec<String>,
    matcher: Regex,
}

impl ClosingVocabulary {
    pub fn new<I, S>(phrases: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = Vec::new();
        for phrase in phrases {
            let phrase = normalize(phrase.as_ref());
            if !phrase.is_empty() && !normalized.contains(&phrase) {
                normalized.push(phrase);
            }
        }
        for command in EXIT_COMMANDS {
            let command = (*command).to_string();
            if !normalized.contains(&command) {
                normalized.push(command);
            }
        }

        // Longer phrases first so "thank you" wins over a shorter prefix alternative.
        let mut alternatives = normalized.clone();
        alternatives.sort_by(|left, right| right.len().cmp(&left.len()).then(left.cmp(right)));
        let body = alternatives.iter().map(|phrase| bounded_pattern(phrase)).collect::<Vec<_>>();
        let matcher = Regex::new(&format!("(?:{})", body.join("|"))).map_err(|error| {
            DomainError::InvariantViolation(format!("closing vocabulary does not compile: {error}"))
        })?;

        Ok(Self { phrases: normalized, matcher })
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// True when any phrase appears as a standalone word or word sequence.
    pub fn mentions_closing(&self, text: &str) -> bool {
        self.matcher.is_match(&text.to_lowercase())
    }

    /// True when the whole input is a closing phrase or exit command.
    pub fn is_exit_command(&self, input: &str) -> bool {
        let normalized = normalize(strip_edges(input));
        !normalized.is_empty()
            && self.phrases.iter().any(|phrase| strip_edges(phrase) == normalized)
    }
}

impl Default for ClosingVocabulary {
    fn default() -> Self {
        match Self::new(DEFAULT_CLOSING_PHRASES) {
            Ok(vocabulary) => vocabulary,
            Err(error) => unreachable!("built-in closing phrases must compile: {error}"),
        }
    }
}

fn normalize(phrase: &str) -> String {
    phrase.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn strip_edges(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || EDGE_PUNCTUATION.contains(&c))
}

/// Escaped pattern with `\b` only on the edges that are word characters.
fn bounded_pattern(phrase: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let body = phrase.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+");
    let lead = if phrase.chars().next().is_some_and(is_word) { r"\b" } else { "" };
    let trail = if phrase.chars().next_back().is_some_and(is_word) { r"\b" } else { "" };
    format!("{lead}{body}{trail}")
}

#[cfg(test)]
mod tests {
    use super::ClosingVocabulary;

    #[test]
    fn standalone_closing_words_match_in_any_case() {
        let vocabulary = ClosingVocabulary::default();

        for text in ["Gracias por todo", "bueno, CHAU", "Perfecto!", "ok, that's all", "Bye."] {
            assert!(vocabulary.mentions_closing(text), "expected closing match for {text:?}");
        }
    }

    #[test]
    fn closing_words_inside_longer_words_do_not_match() {
        let vocabulary = ClosingVocabulary::default();

        for text in [
            "¿Los postres salen imperfectos?",
            "¿Tienen chauchas salteadas?",
            "¿Puedo salirme del menú fijo?",
            "Do you have perfectly cooked steak?",
            "Any thanksgiving specials?",
            "Is the goodbye cake still available?",
            "Is the pasta undone?",
        ] {
            assert!(!vocabulary.mentions_closing(text), "unexpected closing match for {text:?}");
        }
    }

    #[test]
    fn multi_word_phrases_tolerate_extra_whitespace() {
        let vocabulary = ClosingVocabulary::default();

        assert!(vocabulary.mentions_closing("bueno, eso   es todo"));
        assert!(!vocabulary.mentions_closing("eso es todopoderoso"));
    }

    #[test]
    fn exit_commands_require_the_whole_input() {
        let vocabulary = ClosingVocabulary::default();

        assert!(vocabulary.is_exit_command("exit"));
        assert!(vocabulary.is_exit_command("  QUIT "));
        assert!(vocabulary.is_exit_command("Gracias!"));
        assert!(vocabulary.is_exit_command("¡Chau!"));
        assert!(vocabulary.is_exit_command("¡ Chau !"));
        assert!(vocabulary.is_exit_command(" ¿ salir ? "));
        assert!(vocabulary.is_exit_command("Thanks"));
        assert!(!vocabulary.is_exit_command("gracias por la info, ¿y el postre?"));
        assert!(!vocabulary.is_exit_command(""));
    }

    #[test]
    fn custom_vocabulary_always_keeps_exit_commands() {
        let vocabulary =
            ClosingVocabulary::new(["Adiós", "hasta  luego", "adiós"]).expect("vocabulary");

        assert_eq!(vocabulary.phrases(), ["adiós", "hasta luego", "exit", "quit"]);
        assert!(vocabulary.mentions_closing("Bueno, hasta luego"));
        assert!(vocabulary.is_exit_command("exit"));
        assert!(!vocabulary.mentions_closing("gracias"));
    }

    #[test]
    fn phrases_ending_in_punctuation_still_match() {
        let vocabulary = ClosingVocabulary::new(["ok!", "hasta luego"]).expect("vocabulary");

        assert!(vocabulary.mentions_closing("bueno, ok!"));
        assert!(vocabulary.mentions_closing("OK! nos vemos"));
        assert!(!vocabulary.mentions_closing("ese book! es lindo"));
        assert!(!vocabulary.mentions_closing("ok, sigo mirando"));
        assert!(vocabulary.is_exit_command("ok!"));
        assert!(vocabulary.is_exit_command("hasta luego."));
    }
}
