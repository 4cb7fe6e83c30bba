#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use delicia_agent::{
    AgentRuntime, ChatRequest, ChatResponse, LlmClient, ReportSink, Roles, Toolbox,
};
use delicia_core::closing::ClosingVocabulary;
use delicia_core::conversation::ToolInvocation;
use delicia_core::knowledge::restaurant_documents;
use delicia_retrieval::{
    EmbeddingService, HashingEmbedder, KnowledgeBase, RecursiveSplitter, RetrievalError,
};
use serde_json::Value;

/// Replays canned responses in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<ChatResponse, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Result<ChatResponse, String>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), requests: Mutex::new(Vec::new()) })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().expect("requests lock").push(request);
        match self.script.lock().expect("script lock").pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("script exhausted")),
        }
    }
}

/// Always proposes the same tool call, so a pass never ends on its own.
pub struct LoopingLlm {
    pub calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for LoopingLlm {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(tool_call(&format!("loop-{n}"), "off_topic_tool", serde_json::json!({})))
    }
}

/// Counts query embeddings, i.e. menu lookups.
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    pub queries: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: HashingEmbedder::new(128), queries: AtomicUsize::new(0) })
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for CountingEmbedder {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        self.inner.embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_query(text).await
    }
}

pub fn text(reply: &str) -> ChatResponse {
    ChatResponse::text(reply)
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ChatResponse {
    ChatResponse { text: String::new(), tool_calls: vec![ToolInvocation::new(id, name, arguments)] }
}

pub async fn runtime(
    llm: Arc<dyn LlmClient>,
    reports: Arc<dyn ReportSink>,
    embedder: Arc<dyn EmbeddingService>,
    step_limit: usize,
) -> AgentRuntime {
    let splitter = RecursiveSplitter::new(500, 100).expect("splitter");
    let knowledge = KnowledgeBase::build(&restaurant_documents(), &splitter, embedder)
        .await
        .expect("knowledge");
    AgentRuntime::new(
        Roles::new(llm),
        Toolbox::new(knowledge, reports, 3),
        ClosingVocabulary::default(),
        step_limit,
    )
}
