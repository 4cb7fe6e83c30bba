//! Agent runtime for the La Delicia front-of-house assistant.
//!
//! One user input drives one pass of the session state machine:
//! 1. **Routing** (`delicia_core::router`) picks the expert or the summarizer.
//! 2. **Roles** (`roles`) call the chat model with the role's persona and tool offer.
//! 3. **Gating** (`guardrails`) lets a proposed tool run only if the role may use it.
//! 4. **Tools** (`tools`) execute menu lookups, off-topic deflections and session reports.
//!
//! # Key Types
//!
//! - `AgentRuntime` - runs a pass from `Router` to `End` under a step limit
//! - `SessionDriver` - keeps the conversation log and handles exit commands
//! - `LlmClient` - pluggable chat model; `GeminiClient` is the production one
//! - `ReportSink` - where session reports go; `NotionReportSink` in production
//!
//! The model never files a report on its own initiative: only the summarizer is offered
//! the persistence tool, and only the gate decides what executes.

pub mod gemini;
pub mod guardrails;
pub mod llm;
pub mod notion;
pub mod prompts;
pub mod roles;
pub mod runtime;
pub mod session;
pub mod tools;

pub use gemini::{GeminiClient, GeminiSettings};
pub use guardrails::{GateDecision, InvocationVerdict, ToolGate};
pub use llm::{ChatRequest, ChatResponse, LlmClient, ToolChoice, ToolSpec};
pub use notion::{InMemoryReportSink, NotionReportSink, ReportError, ReportSink, SessionReport};
pub use roles::Roles;
pub use runtime::{AgentRuntime, PassOutcome};
pub use session::{SessionDriver, TurnOutcome};
pub use tools::{ToolCall, Toolbox};
