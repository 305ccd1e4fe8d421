//! Pipeline orchestration
//!
//! One `RagPipeline` owns the ingestion side and the query side. Query
//! handling is stateless; conversation state lives in
//! [`crate::session::ChatSession`].

use std::path::Path;
use std::sync::Arc;

use docqa_core::{ConversationTurn, Error, LanguageModel, Message, Result};
use docqa_llm::{query_rewrite_messages, rag_messages};
use docqa_rag::{ContextComposer, IngestPipeline, IngestReport, RetrievalResult, Retriever};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::query_analyzer::{QueryAnalysis, QueryAnalyzer};

/// Answer envelope returned for every query
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    /// Generated answer
    pub answer: String,
    /// Deduplicated citation labels backing the answer
    pub sources: Vec<String>,
    /// The query text that actually drove retrieval (after analysis or
    /// follow-up rewriting), empty for image-only queries
    pub query: String,
}

/// The stateless question-answering engine
pub struct RagPipeline {
    ingest: IngestPipeline,
    retriever: Retriever,
    composer: ContextComposer,
    analyzer: QueryAnalyzer,
    llm: Arc<dyn LanguageModel>,
}

impl RagPipeline {
    pub fn new(
        ingest: IngestPipeline,
        retriever: Retriever,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            ingest,
            retriever,
            composer: ContextComposer::new(),
            analyzer: QueryAnalyzer::new(llm.clone()),
            llm,
        }
    }

    /// Ingest a local document
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        self.ingest.ingest_file(path).await
    }

    /// Fetch and ingest a URL
    pub async fn ingest_url(&self, url: &str) -> Result<IngestReport> {
        self.ingest.ingest_url(url).await
    }

    /// Remove every record of a previously ingested file
    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        self.ingest.delete_file(filename).await
    }

    /// Answer a question over the indexed documents
    #[instrument(skip_all, fields(has_text = text.is_some(), has_image = image.is_some()))]
    pub async fn query(
        &self,
        text: Option<&str>,
        image: Option<&Path>,
        history: &[ConversationTurn],
    ) -> Result<RagResponse> {
        let (messages, sources, effective_query) =
            self.prepare(text, image, history).await?;

        let answer = self.llm.complete(&messages).await?;
        Ok(RagResponse {
            answer,
            sources,
            query: effective_query,
        })
    }

    /// Answer with token streaming; the full response is also returned
    #[instrument(skip_all)]
    pub async fn stream_query(
        &self,
        text: Option<&str>,
        image: Option<&Path>,
        history: &[ConversationTurn],
        tx: mpsc::Sender<String>,
    ) -> Result<RagResponse> {
        let (messages, sources, effective_query) =
            self.prepare(text, image, history).await?;

        let answer = self.llm.complete_stream(&messages, tx).await?;
        Ok(RagResponse {
            answer,
            sources,
            query: effective_query,
        })
    }

    /// Retrieval and prompt assembly shared by both query paths
    async fn prepare(
        &self,
        text: Option<&str>,
        image: Option<&Path>,
        history: &[ConversationTurn],
    ) -> Result<(Vec<Message>, Vec<String>, String)> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());
        if text.is_none() && image.is_none() {
            return Err(Error::InvalidInput(
                "query needs text, an image, or both".to_string(),
            ));
        }

        // Query analysis only applies when an image is attached; text-only
        // follow-ups get rewritten against the conversation instead
        let retrieval_text: Option<String> = match (text, image) {
            (Some(text), Some(_)) => match self.analyzer.analyze(text).await {
                QueryAnalysis::Instruction => None,
                QueryAnalysis::Refined(q) => Some(q),
                QueryAnalysis::PassThrough(q) => Some(q),
            },
            (Some(text), None) => Some(self.rewrite_for_retrieval(text, history).await),
            (None, _) => None,
        };

        let RetrievalResult { records, degraded } = self
            .retriever
            .retrieve(retrieval_text.as_deref(), image, None)
            .await?;
        if degraded {
            debug!("retrieval degraded, answering without context");
        }

        // The prompt builder picks the no-context variant on an empty
        // string; the composer's sentinel is for direct callers
        let context = if records.is_empty() {
            String::new()
        } else {
            self.composer.compose(&records)
        };
        let sources = self
            .composer
            .sources(&records)
            .iter()
            .map(|s| s.display())
            .collect();

        let question = match text {
            Some(t) => t.to_string(),
            None => "Describe what this image shows, using the retrieved context.".to_string(),
        };

        let messages = rag_messages(&question, &context, history);
        Ok((messages, sources, retrieval_text.unwrap_or_default()))
    }

    /// Resolve pronouns and ellipsis against the conversation so retrieval
    /// sees a standalone query; first questions and failures use the raw text
    async fn rewrite_for_retrieval(&self, text: &str, history: &[ConversationTurn]) -> String {
        if history.is_empty() {
            return text.to_string();
        }
        match self
            .llm
            .complete(&query_rewrite_messages(history, text))
            .await
        {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten.trim().to_string(),
            Ok(_) => text.to_string(),
            Err(e) => {
                debug!(error = %e, "query rewrite failed, retrieving with the raw question");
                text.to_string()
            },
        }
    }
}
