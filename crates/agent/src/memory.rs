//! Conversation memory
//!
//! Short-circuits retrieval when the conversation itself already answers the
//! question: a judge prompt either answers from the transcript or returns a
//! sentinel. Memory is consulted before the index, never written to it.
//!
//! When the transcript exceeds its token budget, turns older than the
//! recency window are compressed into a running summary so the judge prompt
//! stays bounded.

use std::sync::Arc;

use docqa_core::{ConversationTurn, LanguageModel};
use docqa_llm::{memory_judge_messages, summary_messages, NO_MEMORY_CONTEXT};
use tracing::{debug, instrument, warn};

/// Memory tuning
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Token budget before older turns are summarized
    pub token_budget: usize,
    /// Recent turns kept verbatim when summarizing
    pub recency_window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            token_budget: docqa_config::constants::memory::TOKEN_BUDGET,
            recency_window: docqa_config::constants::memory::RECENCY_WINDOW,
        }
    }
}

impl From<docqa_config::MemoryConfig> for MemoryConfig {
    fn from(c: docqa_config::MemoryConfig) -> Self {
        Self {
            token_budget: c.token_budget,
            recency_window: c.recency_window,
        }
    }
}

/// Per-conversation memory with judge-based recall
pub struct ConversationMemory {
    llm: Arc<dyn LanguageModel>,
    config: MemoryConfig,
    turns: Vec<ConversationTurn>,
    /// Summary of turns evicted from the transcript
    summary: Option<String>,
}

impl ConversationMemory {
    pub fn new(llm: Arc<dyn LanguageModel>, config: MemoryConfig) -> Self {
        Self {
            llm,
            config,
            turns: Vec::new(),
            summary: None,
        }
    }

    /// Ask the judge whether the conversation already answers `question`
    ///
    /// Returns `Some(answer)` on a memory hit, `None` otherwise. Empty
    /// history never calls the model. Judge failures count as a miss so the
    /// question falls through to retrieval.
    #[instrument(skip_all)]
    pub async fn consult(&self, question: &str) -> Option<String> {
        if self.turns.is_empty() && self.summary.is_none() {
            return None;
        }

        let transcript = self.transcript_turns();
        let messages = memory_judge_messages(&transcript, question);

        let response = match self.llm.complete(&messages).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "memory judge failed, falling through to retrieval");
                return None;
            },
        };

        let trimmed = response.trim();
        if trimmed.is_empty() || trimmed.contains(NO_MEMORY_CONTEXT) {
            debug!("memory miss");
            return None;
        }

        debug!("memory hit");
        Some(trimmed.to_string())
    }

    /// Record a completed exchange and compress if over budget
    pub async fn record(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
        if self.estimated_tokens() > self.config.token_budget {
            self.compress().await;
        }
    }

    /// Turns currently held verbatim
    pub fn history(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.summary.is_none()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.summary = None;
    }

    /// Estimated token footprint of the transcript plus summary
    pub fn estimated_tokens(&self) -> usize {
        let turns: usize = self.turns.iter().map(|t| t.estimated_tokens()).sum();
        let summary = self
            .summary
            .as_ref()
            .map(|s| s.len().div_ceil(4))
            .unwrap_or(0);
        turns + summary
    }

    /// The transcript handed to prompts: running summary first (as a
    /// synthetic turn), then the verbatim turns
    fn transcript_turns(&self) -> Vec<ConversationTurn> {
        let mut transcript = Vec::with_capacity(self.turns.len() + 1);
        if let Some(ref summary) = self.summary {
            transcript.push(ConversationTurn::new(
                "Summarize what we discussed so far.",
                summary.clone(),
                Vec::new(),
            ));
        }
        transcript.extend(self.turns.iter().cloned());
        transcript
    }

    /// Summarize everything older than the recency window
    ///
    /// Summarizer failure is non-fatal: the old turns stay verbatim and
    /// compression is retried on the next recorded exchange.
    async fn compress(&mut self) {
        if self.turns.len() <= self.config.recency_window {
            return;
        }

        let split = self.turns.len() - self.config.recency_window;
        let old_turns: Vec<ConversationTurn> = self.turns.drain(..split).collect();

        let mut to_summarize = Vec::new();
        if let Some(ref summary) = self.summary {
            to_summarize.push(ConversationTurn::new(
                "Summarize what we discussed so far.",
                summary.clone(),
                Vec::new(),
            ));
        }
        to_summarize.extend(old_turns.iter().cloned());

        match self.llm.complete(&summary_messages(&to_summarize)).await {
            Ok(summary) if !summary.trim().is_empty() => {
                debug!(
                    evicted = to_summarize.len(),
                    "compressed memory into summary"
                );
                self.summary = Some(summary.trim().to_string());
            },
            Ok(_) | Err(_) => {
                warn!("memory summarization failed, keeping turns verbatim");
                self.turns.splice(0..0, old_turns);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_core::{Error, Message, Result};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Scripted model: pops canned responses, records received prompts
    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
        calls: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn complete(&self, messages: &[Message]) -> Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::Llm("script exhausted".to_string()))
        }

        async fn complete_stream(
            &self,
            messages: &[Message],
            _tx: mpsc::Sender<String>,
        ) -> Result<String> {
            self.complete(messages).await
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn turn(input: &str, output: &str) -> ConversationTurn {
        ConversationTurn::new(input, output, Vec::new())
    }

    #[tokio::test]
    async fn test_empty_history_skips_the_judge() {
        let llm = Arc::new(ScriptedLlm::new(vec!["should never be used"]));
        let memory = ConversationMemory::new(llm.clone(), MemoryConfig::default());

        assert!(memory.consult("anything?").await.is_none());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sentinel_means_miss() {
        let llm = Arc::new(ScriptedLlm::new(vec![NO_MEMORY_CONTEXT]));
        let mut memory = ConversationMemory::new(llm.clone(), MemoryConfig::default());
        memory.record(turn("What is RAG?", "Retrieval augmented generation.")).await;

        assert!(memory.consult("Unrelated question?").await.is_none());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_hit_returns_the_judge_answer() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "You asked about RAG, which is retrieval augmented generation.",
        ]));
        let mut memory = ConversationMemory::new(llm, MemoryConfig::default());
        memory.record(turn("What is RAG?", "Retrieval augmented generation.")).await;

        let answer = memory.consult("What did I ask about?").await.unwrap();
        assert!(answer.contains("retrieval augmented generation"));
    }

    #[tokio::test]
    async fn test_judge_failure_falls_through() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let mut memory = ConversationMemory::new(llm, MemoryConfig::default());
        memory.record(turn("a", "b")).await;

        assert!(memory.consult("question").await.is_none());
    }

    #[tokio::test]
    async fn test_over_budget_compresses_old_turns() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "Summary of earlier discussion.",
            "Combined summary of the discussion.",
        ]));
        let config = MemoryConfig {
            token_budget: 100,
            recency_window: 2,
        };
        let mut memory = ConversationMemory::new(llm.clone(), config);

        let long = "x".repeat(200);
        for i in 0..4 {
            memory.record(turn(&format!("question {i}"), &long)).await;
        }

        // The budget was exceeded twice; the second pass folds the running
        // summary in with the next evicted turn
        assert_eq!(llm.call_count(), 2);
        assert_eq!(memory.history().len(), 2);
        assert_eq!(memory.summary(), Some("Combined summary of the discussion."));
    }

    #[tokio::test]
    async fn test_summarizer_failure_keeps_turns_verbatim() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let config = MemoryConfig {
            token_budget: 50,
            recency_window: 1,
        };
        let mut memory = ConversationMemory::new(llm, config);

        memory.record(turn("one", &"x".repeat(200))).await;
        memory.record(turn("two", &"y".repeat(200))).await;

        // Nothing is lost on failure; order is preserved
        assert_eq!(memory.history().len(), 2);
        assert_eq!(memory.history()[0].input, "one");
        assert!(memory.summary().is_none());
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let mut memory = ConversationMemory::new(llm, MemoryConfig::default());
        memory.record(turn("a", "b")).await;

        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.estimated_tokens(), 0);
    }
}
