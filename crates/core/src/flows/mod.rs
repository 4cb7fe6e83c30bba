pub mod engine;
pub mod states;

pub use engine::{FlowTransitionError, SessionFlow};
pub use states::{Role, SessionAction, SessionEvent, SessionNode, TransitionOutcome};
