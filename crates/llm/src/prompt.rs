//! Prompt construction
//!
//! Every LLM call in the pipeline goes through one of these builders so the
//! wording lives in exactly one place. Builders return message lists ready
//! for [`docqa_core::LanguageModel`].

use docqa_core::{ConversationTurn, Message};

/// Sentinel the memory judge must emit when the conversation history cannot
/// answer the question
pub const NO_MEMORY_CONTEXT: &str = "NO_MEMORY_CONTEXT";

/// Answer-generation prompt over retrieved context
///
/// With empty context the model is told to answer from general knowledge
/// and say so, rather than hallucinating citations.
pub fn rag_messages(question: &str, context: &str, history: &[ConversationTurn]) -> Vec<Message> {
    let system = if context.trim().is_empty() {
        "You are a helpful document-question-answering assistant. No relevant \
         documents were found for this question. Answer from general knowledge \
         if you can, and state clearly that the answer is not based on the \
         user's documents. Do not invent citations."
            .to_string()
    } else {
        format!(
            "You are a helpful document-question-answering assistant. Answer the \
             user's question using ONLY the context below. Cite sources using \
             their bracketed markers, e.g. [Source 1]. If the context does not \
             contain the answer, say you don't know.\n\nContext:\n{context}"
        )
    };

    let mut messages = vec![Message::system(system)];
    for turn in history {
        messages.push(Message::user(&turn.input));
        messages.push(Message::assistant(&turn.output));
    }
    messages.push(Message::user(question));
    messages
}

/// Memory judge prompt
///
/// Asks whether the conversation so far already answers the question. The
/// model must either answer from the history verbatim facts or reply with
/// the [`NO_MEMORY_CONTEXT`] sentinel, nothing else.
pub fn memory_judge_messages(history: &[ConversationTurn], question: &str) -> Vec<Message> {
    let mut transcript = String::new();
    for turn in history {
        transcript.push_str(&format!("User: {}\nAssistant: {}\n", turn.input, turn.output));
    }

    let system = format!(
        "You are a conversation memory judge. Below is the conversation so far.\n\
         If the conversation already contains the information needed to answer \
         the user's new question, answer it using only that information.\n\
         If it does not, respond with exactly {NO_MEMORY_CONTEXT} and nothing \
         else.\n\nConversation:\n{transcript}"
    );

    vec![Message::system(system), Message::user(question)]
}

/// Query analysis prompt for image-accompanied queries
///
/// The model must respond with strict JSON:
/// `{"is_instruction": bool, "search_query": string or null}`.
/// `is_instruction` is true when the text is a command about the image
/// ("describe this", "what is shown here") rather than a retrieval query;
/// `search_query` is a cleaned-up retrieval query when one can be extracted.
pub fn query_analysis_messages(query: &str) -> Vec<Message> {
    let system = "You analyze user queries that accompany an uploaded image. \
                  Respond with strict JSON only, no prose, in the form \
                  {\"is_instruction\": boolean, \"search_query\": string or null}. \
                  Set is_instruction to true when the text is an instruction about \
                  the image itself rather than a question to search documents for. \
                  Set search_query to a concise retrieval query when the text \
                  contains one, otherwise null.";

    vec![Message::system(system), Message::user(query)]
}

/// Standalone-query rewrite prompt
///
/// Resolves pronouns and ellipsis against the conversation so the retriever
/// sees a self-contained query.
pub fn query_rewrite_messages(history: &[ConversationTurn], question: &str) -> Vec<Message> {
    let mut transcript = String::new();
    for turn in history {
        transcript.push_str(&format!("User: {}\nAssistant: {}\n", turn.input, turn.output));
    }

    let system = format!(
        "Rewrite the user's question as a standalone search query, resolving \
         any references to the conversation below. Respond with the rewritten \
         query only, no explanation.\n\nConversation:\n{transcript}"
    );

    vec![Message::system(system), Message::user(question)]
}

/// Conversation summarization prompt used when memory exceeds its budget
pub fn summary_messages(turns: &[ConversationTurn]) -> Vec<Message> {
    let mut transcript = String::new();
    for turn in turns {
        transcript.push_str(&format!("User: {}\nAssistant: {}\n", turn.input, turn.output));
    }

    let system = "Summarize the conversation below in a few sentences, keeping \
                  every concrete fact, name, and number that later questions \
                  might refer back to. Respond with the summary only.";

    vec![Message::system(system), Message::user(transcript)]
}
