//! Input sanitization and prompt-injection screening
//!
//! Runs before anything reaches the retrieval core. A rejected query never
//! gets embedded or sent to the model.

use regex::{Regex, RegexSet, RegexSetBuilder};
use thiserror::Error;

/// Longest accepted query, in characters
pub const MAX_QUERY_CHARS: usize = 2000;

const INJECTION_PATTERNS: &[&str] = &[
    r"ignore\s+(all\s+)?(previous|above|your)\s+instructions",
    r"forget\s+(everything|what\s+i\s+said|your\s+(system|prompt))",
    r"you\s+are\s+now\s+(a|an)\s+",
    r"new\s+(persona|role|identity|instructions|system\s+prompt)",
    r"act\s+as\s+(a|an)\s+",
    r"(reveal|show|print|output|display)\s+(your\s+)?(system\s+)?prompt",
    r"<\s*(system|user|assistant)\s*>",
    r"\[INST\]|<<SYS>>",
    r"\\n\s*(system|user|assistant)\s*:",
    r"disregard\s+(all\s+)?(previous|prior)\s+(instructions|messages)",
    r"pretend\s+(you\s+are|to\s+be)\s+",
    r"jailbreak",
    r"DAN\s+mode",
    r"do\s+anything\s+now",
];

/// Why a query was refused. The display text is safe to show the visitor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("Please ask a question.")]
    Empty,

    #[error("Please keep your question under {MAX_QUERY_CHARS} characters.")]
    TooLong,

    #[error("I noticed something unusual in your message. Please ask a straightforward question about my professional background!")]
    Injection,
}

#[derive(Debug, Clone)]
pub struct InputSanitizer {
    injection: RegexSet,
    control: Regex,
    spaces: Regex,
}

impl InputSanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            injection: RegexSetBuilder::new(INJECTION_PATTERNS)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()?,
            // Newlines and tabs survive
            control: Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]")?,
            spaces: Regex::new(r" {3,}")?,
        })
    }

    /// Cleaned query, or the reason it was refused
    pub fn sanitize(&self, query: &str) -> Result<String, SanitizeError> {
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(SanitizeError::TooLong);
        }
        if query.trim().is_empty() {
            return Err(SanitizeError::Empty);
        }
        if self.injection.is_match(query) {
            let preview: String = query.chars().take(100).collect();
            tracing::warn!("Prompt injection attempt detected: {}", preview);
            return Err(SanitizeError::Injection);
        }

        let cleaned = self.control.replace_all(query, "");
        let cleaned = self.spaces.replace_all(&cleaned, "  ");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(SanitizeError::Empty);
        }
        Ok(cleaned.to_string())
    }
}
