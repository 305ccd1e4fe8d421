//! Chat session
//!
//! Wraps one conversation: consults memory before retrieval for text-only
//! questions, delegates to the pipeline otherwise, and records every
//! completed exchange. Memory hits cite a single synthetic source so the
//! caller can tell them apart from document-backed answers.

use std::path::Path;
use std::sync::Arc;

use docqa_core::{ConversationTurn, Result};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, instrument};

use crate::memory::ConversationMemory;
use crate::pipeline::{RagPipeline, RagResponse};

/// One user's conversation over the document index
pub struct ChatSession {
    pipeline: Arc<RagPipeline>,
    memory: Mutex<ConversationMemory>,
    memory_enabled: bool,
}

impl ChatSession {
    pub fn new(pipeline: Arc<RagPipeline>, memory: ConversationMemory) -> Self {
        Self {
            pipeline,
            memory: Mutex::new(memory),
            memory_enabled: true,
        }
    }

    /// Disable the memory short-circuit; every question hits retrieval
    pub fn without_memory(mut self) -> Self {
        self.memory_enabled = false;
        self
    }

    /// Answer a question, consulting memory first for text-only queries
    #[instrument(skip_all)]
    pub async fn ask(&self, text: Option<&str>, image: Option<&Path>) -> Result<RagResponse> {
        let mut memory = self.memory.lock().await;

        if let Some(response) = self.try_memory(&memory, text, image).await {
            memory
                .record(ConversationTurn::new(
                    text.unwrap_or_default(),
                    response.answer.clone(),
                    response.sources.clone(),
                ))
                .await;
            return Ok(response);
        }

        let response = self.pipeline.query(text, image, memory.history()).await?;
        memory
            .record(ConversationTurn::new(
                text.unwrap_or_default(),
                response.answer.clone(),
                response.sources.clone(),
            ))
            .await;
        Ok(response)
    }

    /// Streaming variant of [`ask`](Self::ask)
    ///
    /// A memory hit streams the whole answer as one increment.
    #[instrument(skip_all)]
    pub async fn ask_stream(
        &self,
        text: Option<&str>,
        image: Option<&Path>,
        tx: mpsc::Sender<String>,
    ) -> Result<RagResponse> {
        let mut memory = self.memory.lock().await;

        if let Some(response) = self.try_memory(&memory, text, image).await {
            let _ = tx.send(response.answer.clone()).await;
            memory
                .record(ConversationTurn::new(
                    text.unwrap_or_default(),
                    response.answer.clone(),
                    response.sources.clone(),
                ))
                .await;
            return Ok(response);
        }

        let response = self
            .pipeline
            .stream_query(text, image, memory.history(), tx)
            .await?;
        memory
            .record(ConversationTurn::new(
                text.unwrap_or_default(),
                response.answer.clone(),
                response.sources.clone(),
            ))
            .await;
        Ok(response)
    }

    /// The underlying stateless pipeline (ingestion, deletion)
    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.pipeline
    }

    /// Forget the conversation so far
    pub async fn reset(&self) {
        self.memory.lock().await.clear();
    }

    /// Number of turns currently held verbatim in memory
    pub async fn turn_count(&self) -> usize {
        self.memory.lock().await.history().len()
    }

    /// Memory consultation: text-only queries with memory enabled
    async fn try_memory(
        &self,
        memory: &ConversationMemory,
        text: Option<&str>,
        image: Option<&Path>,
    ) -> Option<RagResponse> {
        if !self.memory_enabled || image.is_some() {
            return None;
        }
        let question = text.map(str::trim).filter(|t| !t.is_empty())?;

        let answer = memory.consult(question).await?;
        debug!("answered from conversation memory");
        Some(RagResponse {
            answer,
            sources: vec![docqa_config::constants::memory::MEMORY_SOURCE.to_string()],
            query: question.to_string(),
        })
    }
}
