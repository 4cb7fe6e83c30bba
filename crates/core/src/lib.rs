//! Domain types for the La Delicia front-of-house agent: layered configuration, the
//! conversation log, the closing vocabulary, the router and the session state machine.
//!
//! Nothing in this crate performs I/O beyond reading the config file.

pub mod actions;
pub mod closing;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod flows;
pub mod knowledge;
pub mod router;

pub use actions::{allowed_tools, ToolKind};
pub use closing::{ClosingVocabulary, DEFAULT_CLOSING_PHRASES, EXIT_COMMANDS};
pub use config::{AppConfig, ConfigError, EmbeddingProvider, LoadOptions, LogFormat};
pub use conversation::{ChatTurn, ConversationState, ToolInvocation};
pub use errors::{ApplicationError, DomainError};
pub use flows::{
    FlowTransitionError, Role, SessionAction, SessionEvent, SessionFlow, SessionNode,
    TransitionOutcome,
};
pub use knowledge::{restaurant_documents, SourceDocument};
pub use router::route;
