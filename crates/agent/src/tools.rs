use std::sync::Arc;

use anyhow::{Context, Result};
use delicia_core::actions::{allowed_tools, ToolKind};
use delicia_core::conversation::ToolInvocation;
use delicia_core::flows::Role;
use delicia_retrieval::KnowledgeBase;
use serde_json::json;
use thiserror::Error;

use crate::llm::ToolSpec;
use crate::notion::{ReportError, ReportSink, SessionReport};

pub const OFF_TOPIC_MESSAGE: &str = "Disculpe, como mozo virtual de 'La Delicia', solo puedo \
responder preguntas sobre nuestro menú, ingredientes, precios y horarios. ¿Le gustaría saber \
algo sobre nuestros platos?";

/// A validated tool invocation. Construction goes through [`ToolCall::parse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCall {
    MenuLookup { query: String },
    OffTopic,
    SaveReport { initial_inquiry: Option<String>, summary: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("herramienta desconocida '{0}'")]
    UnknownTool(String),
    #[error("falta el argumento '{argument}' para '{tool}'")]
    MissingArgument { tool: &'static str, argument: &'static str },
}

impl ToolCall {
    pub fn parse(invocation: &ToolInvocation) -> Result<Self, ToolCallError> {
        let kind = ToolKind::from_name(&invocation.name)
            .ok_or_else(|| ToolCallError::UnknownTool(invocation.name.clone()))?;

        let required = |argument: &'static str| {
            invocation
                .string_argument(argument)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or(ToolCallError::MissingArgument { tool: kind.name(), argument })
        };

        match kind {
            ToolKind::MenuLookup => Ok(Self::MenuLookup { query: required("query")? }),
            ToolKind::OffTopic => Ok(Self::OffTopic),
            ToolKind::SaveReport => Ok(Self::SaveReport {
                initial_inquiry: required("initial_inquiry").ok(),
                summary: required("summary")?,
            }),
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::MenuLookup { .. } => ToolKind::MenuLookup,
            Self::OffTopic => ToolKind::OffTopic,
            Self::SaveReport { .. } => ToolKind::SaveReport,
        }
    }
}

pub fn tool_spec(kind: ToolKind) -> ToolSpec {
    let (description, parameters) = match kind {
        ToolKind::MenuLookup => (
            "Busca info sobre platos, ingredientes, precios, opciones vegetarianas y horarios \
             del restaurante 'La Delicia'.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Lo que se quiere buscar." }
                },
                "required": ["query"],
            }),
        ),
        ToolKind::OffTopic => (
            "Se activa cuando el usuario pregunta algo no relacionado con el restaurante, el \
             menú, los precios o los horarios. Devuelve un mensaje de redirección amable.",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolKind::SaveReport => (
            "Guarda en Notion un informe con la primera consulta del cliente y un resumen final.",
            json!({
                "type": "object",
                "properties": {
                    "initial_inquiry": {
                        "type": "string",
                        "description": "La primera pregunta del cliente."
                    },
                    "summary": {
                        "type": "string",
                        "description": "Un resumen (máx. 2 frases) de lo conversado."
                    }
                },
                "required": ["initial_inquiry", "summary"],
            }),
        ),
    };

    ToolSpec { name: kind.name().to_string(), description: description.to_string(), parameters }
}

pub fn specs_for(role: Role) -> Vec<ToolSpec> {
    allowed_tools(role).iter().copied().map(tool_spec).collect()
}

/// Executes validated tool calls against the knowledge base and the report sink.
#[derive(Clone)]
pub struct Toolbox {
    knowledge: KnowledgeBase,
    reports: Arc<dyn ReportSink>,
    top_k: usize,
}

impl Toolbox {
    pub fn new(knowledge: KnowledgeBase, reports: Arc<dyn ReportSink>, top_k: usize) -> Self {
        Self { knowledge, reports, top_k }
    }

    /// Runs one call. Retrieval failures propagate; report failures come back as text.
    pub async fn execute(&self, call: &ToolCall, fallback_inquiry: &str) -> Result<String> {
        match call {
            ToolCall::MenuLookup { query } => {
                let hits = self
                    .knowledge
                    .search(query, self.top_k)
                    .await
                    .with_context(|| format!("knowledge search failed for `{query}`"))?;
                Ok(hits.into_iter().map(|hit| hit.chunk.text).collect::<Vec<_>>().join("\n\n"))
            }
            ToolCall::OffTopic => Ok(OFF_TOPIC_MESSAGE.to_string()),
            ToolCall::SaveReport { initial_inquiry, summary } => {
                let inquiry = initial_inquiry.as_deref().unwrap_or(fallback_inquiry);
                Ok(self.save_report(inquiry, summary).await)
            }
        }
    }

    /// Files a session report and describes the outcome; never fails.
    pub async fn save_report(&self, initial_inquiry: &str, summary: &str) -> String {
        let report = SessionReport::new(initial_inquiry, summary);
        match self.reports.save(&report).await {
            Ok(()) => format!("Informe guardado en Notion (consulta: '{initial_inquiry}')."),
            Err(ReportError::MissingCredentials) => {
                "Error: faltan NOTION_API_KEY o NOTION_DATABASE_ID.".to_string()
            }
            Err(ReportError::Api(detail)) => format!("Error al guardar en Notion: {detail}"),
        }
    }
}
