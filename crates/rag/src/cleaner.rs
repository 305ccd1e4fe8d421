//! Text cleanup before chunking
//!
//! Normalizes whitespace and strips the boilerplate lines PDF extraction
//! tends to leave behind (page numbers, copyright footers).

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static MULTI_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static SPECIAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\w\s.,!?;:'"()\-]"#).unwrap());
static HEADER_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^(page\s*\d+|©.*|all rights reserved.*|\d+\s*of\s*\d+).*$").unwrap()
});

/// Cleans raw extracted text
#[derive(Debug, Clone, Default)]
pub struct TextCleaner {
    /// Strip characters outside the basic word/punctuation set
    pub remove_special_chars: bool,
}

impl TextCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize whitespace and optionally strip special characters
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let text = if self.remove_special_chars {
            SPECIAL_CHARS.replace_all(text, " ").into_owned()
        } else {
            text.to_string()
        };

        self.normalize_whitespace(&text).trim().to_string()
    }

    /// Collapse runs of whitespace within lines, cap blank runs at one
    pub fn normalize_whitespace(&self, text: &str) -> String {
        let text = MULTI_NEWLINES.replace_all(text, "\n\n");
        text.split('\n')
            .map(|line| WHITESPACE.replace_all(line, " ").trim().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Remove header/footer boilerplate lines
    pub fn remove_headers_footers(&self, text: &str) -> String {
        HEADER_FOOTER.replace_all(text, "").into_owned()
    }

    /// Split into sentences on terminal punctuation followed by a capital
    pub fn extract_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;
        let bytes = text.char_indices().collect::<Vec<_>>();

        for window in bytes.windows(2) {
            let (i, c) = window[0];
            let (_, next) = window[1];
            if matches!(c, '.' | '!' | '?') && next.is_whitespace() {
                // Peek past the whitespace run for an uppercase start
                let rest = &text[i + c.len_utf8()..];
                if rest
                    .trim_start()
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_uppercase())
                {
                    let sentence = text[start..i + c.len_utf8()].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence.to_string());
                    }
                    start = i + c.len_utf8();
                }
            }
        }

        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }
}

/// Full document cleanup: normalize, then drop headers/footers
pub fn clean_document_text(text: &str, remove_headers: bool) -> String {
    let cleaner = TextCleaner::new();
    let cleaned = cleaner.clean(text);
    if remove_headers {
        cleaner.remove_headers_footers(&cleaned)
    } else {
        cleaned
    }
}
