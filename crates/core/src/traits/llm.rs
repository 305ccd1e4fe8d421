//! Language model trait

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::llm_types::Message;
use crate::Result;

/// Language model interface
///
/// Implementations:
/// - `OllamaBackend` - local Ollama chat API
///
/// # Example
///
/// ```ignore
/// let llm: Arc<dyn LanguageModel> = Arc::new(OllamaBackend::new(config)?);
/// let answer = llm.complete(&[Message::user("What is a vector index?")]).await?;
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for the given messages
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Generate a completion, streaming text increments over the channel
    ///
    /// The full response is also returned once the stream finishes. Dropping
    /// the receiver cancels generation; the partial text generated so far is
    /// returned in that case.
    async fn complete_stream(
        &self,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<String>;

    /// Check whether the backend is reachable
    async fn is_available(&self) -> bool;

    /// Model name for logging
    fn model_name(&self) -> &str;

    /// Estimate token count for text (~4 characters per token)
    fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count().max(1) / 4
    }
}
