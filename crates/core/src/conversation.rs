//! Conversation types

use serde::{Deserialize, Serialize};

/// One completed question/answer exchange
///
/// Turns are owned exclusively by the conversation memory. They are never
/// written back to the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The user's question
    pub input: String,
    /// The generated answer
    pub output: String,
    /// Source labels cited by the answer
    #[serde(default)]
    pub sources: Vec<String>,
}

impl ConversationTurn {
    pub fn new(
        input: impl Into<String>,
        output: impl Into<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            sources,
        }
    }

    /// Estimated token footprint (1 token per ~4 characters, plus framing)
    pub fn estimated_tokens(&self) -> usize {
        (self.input.len() + self.output.len()).div_ceil(4) + 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_tokens_nonzero() {
        let turn = ConversationTurn::new("hi", "hello there", vec![]);
        assert!(turn.estimated_tokens() > 0);
    }
}
