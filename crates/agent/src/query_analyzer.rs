//! Query analysis for image-accompanied questions
//!
//! When a question arrives with an image, the text may be an instruction
//! about the image ("describe this") rather than a retrieval query. A single
//! LLM call classifies it; any failure falls open to passing the raw text
//! through so retrieval still happens.

use std::sync::Arc;

use docqa_core::LanguageModel;
use docqa_llm::query_analysis_messages;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// What the query text turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryAnalysis {
    /// The text is an instruction about the image; only the image should
    /// drive retrieval
    Instruction,
    /// A cleaner retrieval query was extracted from the text
    Refined(String),
    /// The raw text is used as-is
    PassThrough(String),
}

impl QueryAnalysis {
    /// The text to retrieve with, if any
    pub fn search_text(&self) -> Option<&str> {
        match self {
            QueryAnalysis::Instruction => None,
            QueryAnalysis::Refined(q) | QueryAnalysis::PassThrough(q) => Some(q),
        }
    }
}

#[derive(Deserialize)]
struct AnalysisResponse {
    is_instruction: bool,
    search_query: Option<String>,
}

/// LLM-backed query classifier
pub struct QueryAnalyzer {
    llm: Arc<dyn LanguageModel>,
}

impl QueryAnalyzer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Classify query text that accompanies an image
    ///
    /// Never fails: LLM errors and unparseable output both degrade to
    /// `PassThrough` of the raw text.
    #[instrument(skip_all)]
    pub async fn analyze(&self, query: &str) -> QueryAnalysis {
        let query = query.trim();
        if query.is_empty() {
            return QueryAnalysis::PassThrough(String::new());
        }

        let response = match self.llm.complete(&query_analysis_messages(query)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "query analysis failed, passing query through");
                return QueryAnalysis::PassThrough(query.to_string());
            },
        };

        match parse_analysis(&response) {
            Some(parsed) if parsed.is_instruction => {
                debug!("query classified as instruction");
                QueryAnalysis::Instruction
            },
            Some(parsed) => match parsed.search_query.filter(|q| !q.trim().is_empty()) {
                Some(refined) => {
                    debug!(%refined, "query refined");
                    QueryAnalysis::Refined(refined.trim().to_string())
                },
                None => QueryAnalysis::PassThrough(query.to_string()),
            },
            None => {
                warn!("unparseable query analysis output, passing query through");
                QueryAnalysis::PassThrough(query.to_string())
            },
        }
    }
}

/// Parse the strict-JSON analysis response, tolerating code fences
fn parse_analysis(response: &str) -> Option<AnalysisResponse> {
    let trimmed = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_core::{Error, Message, Result};
    use tokio::sync::mpsc;

    struct OneShotLlm {
        response: Result<&'static str>,
    }

    #[async_trait]
    impl LanguageModel for OneShotLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String> {
            match &self.response {
                Ok(r) => Ok(r.to_string()),
                Err(_) => Err(Error::Llm("down".to_string())),
            }
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
            "oneshot"
        }
    }

    fn analyzer(response: Result<&'static str>) -> QueryAnalyzer {
        QueryAnalyzer::new(Arc::new(OneShotLlm { response }))
    }

    #[tokio::test]
    async fn test_instruction_detected() {
        let a = analyzer(Ok(r#"{"is_instruction": true, "search_query": null}"#));
        assert_eq!(a.analyze("describe this image").await, QueryAnalysis::Instruction);
    }

    #[tokio::test]
    async fn test_refined_query_extracted() {
        let a = analyzer(Ok(
            r#"{"is_instruction": false, "search_query": "quarterly revenue chart"}"#,
        ));
        let result = a.analyze("whats in the revenue thing").await;
        assert_eq!(result, QueryAnalysis::Refined("quarterly revenue chart".to_string()));
        assert_eq!(result.search_text(), Some("quarterly revenue chart"));
    }

    #[tokio::test]
    async fn test_null_query_passes_through() {
        let a = analyzer(Ok(r#"{"is_instruction": false, "search_query": null}"#));
        assert_eq!(
            a.analyze("hm").await,
            QueryAnalysis::PassThrough("hm".to_string())
        );
    }

    #[tokio::test]
    async fn test_llm_failure_fails_open() {
        let a = analyzer(Err(Error::Llm("down".to_string())));
        assert_eq!(
            a.analyze("find the chart").await,
            QueryAnalysis::PassThrough("find the chart".to_string())
        );
    }

    #[tokio::test]
    async fn test_garbage_output_fails_open() {
        let a = analyzer(Ok("I think this is an instruction."));
        assert_eq!(
            a.analyze("query").await,
            QueryAnalysis::PassThrough("query".to_string())
        );
    }

    #[tokio::test]
    async fn test_code_fenced_json_accepted() {
        let a = analyzer(Ok(
            "```json\n{\"is_instruction\": true, \"search_query\": null}\n```",
        ));
        assert_eq!(a.analyze("describe it").await, QueryAnalysis::Instruction);
    }

    #[tokio::test]
    async fn test_instruction_has_no_search_text() {
        assert_eq!(QueryAnalysis::Instruction.search_text(), None);
    }
}
