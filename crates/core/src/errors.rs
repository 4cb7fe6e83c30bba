use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("session pass exceeded the step limit of {limit} without reaching the end state")]
    StepLimitExceeded { limit: usize },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("integration failure: {0}")]
    Integration(String),
}

impl ApplicationError {
    /// Text shown to the guest when a pass cannot complete.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::StepLimitExceeded { .. }) => {
                "Disculpe, no pude completar su consulta. ¿Podría reformularla?"
            }
            Self::Domain(_) => "Disculpe, ocurrió un error interno al procesar su consulta.",
            Self::Integration(_) => {
                "Disculpe, un servicio externo no está disponible. Intente nuevamente en unos instantes."
            }
        }
    }

    pub fn is_step_limit(&self) -> bool {
        matches!(self, Self::Domain(DomainError::StepLimitExceeded { .. }))
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError};
    use crate::flows::{FlowTransitionError, SessionEvent, SessionNode};

    #[test]
    fn step_limit_maps_to_rephrase_message() {
        let error = ApplicationError::from(DomainError::StepLimitExceeded { limit: 25 });

        assert!(error.is_step_limit());
        assert!(error.to_string().contains("step limit of 25"));
        assert!(error.user_message().contains("reformularla"));
    }

    #[test]
    fn flow_transition_error_is_transparent() {
        let error = ApplicationError::from(DomainError::from(
            FlowTransitionError::InvalidTransition {
                state: SessionNode::End,
                event: SessionEvent::ToolResultsAppended,
            },
        ));

        assert!(!error.is_step_limit());
        assert!(error.to_string().contains("invalid transition from End"));
        assert!(error.user_message().contains("error interno"));
    }

    #[test]
    fn integration_error_has_user_safe_message() {
        let error = ApplicationError::Integration("gemini returned 503".to_owned());

        assert!(!error.user_message().contains("gemini"));
        assert!(error.user_message().contains("servicio externo"));
    }
}
