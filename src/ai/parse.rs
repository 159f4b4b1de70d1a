//! Two-stage parsing of model replies.
//!
//! Models are asked for bare JSON but often wrap it in prose or a code fence.
//! The reply is parsed strictly first; failing that, the first balanced
//! `{...}` substring is parsed.

use serde::de::DeserializeOwned;

use crate::error::AppError;

#[derive(Debug, PartialEq)]
pub enum ReplyParse<T> {
    /// The whole reply was the expected JSON.
    Strict(T),
    /// The JSON was recovered from surrounding text.
    Extracted(T),
    Unparseable { reason: String },
}

impl<T> ReplyParse<T> {
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            ReplyParse::Strict(value) | ReplyParse::Extracted(value) => Ok(value),
            ReplyParse::Unparseable { reason } => Err(AppError::GenerationParse(reason)),
        }
    }
}

pub fn parse_reply<T: DeserializeOwned>(raw: &str) -> ReplyParse<T> {
    let strict_err = match serde_json::from_str::<T>(raw.trim()) {
        Ok(value) => return ReplyParse::Strict(value),
        Err(e) => e,
    };

    let Some(candidate) = first_balanced_object(raw) else {
        return ReplyParse::Unparseable {
            reason: format!("no JSON object in reply ({})", strict_err),
        };
    };

    match serde_json::from_str::<T>(candidate) {
        Ok(value) => ReplyParse::Extracted(value),
        Err(e) => ReplyParse::Unparseable {
            reason: format!("extracted object did not match: {}", e),
        },
    }
}

/// Returns the first `{...}` run whose braces balance, ignoring braces inside
/// JSON string literals.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&text[start..]) {
            return Some(&text[start..start + end]);
        }
        search_from = start + 1;
    }
    None
}

// byte length of the balanced object at the start of `text`
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlashcardsReply, QuizReply};

    #[test]
    fn bare_json_parses_strictly() {
        let raw = r#"{"flashcards":[{"topic":"Cells","question":"What is a cell?","answer":"A unit of life"}]}"#;
        match parse_reply::<FlashcardsReply>(raw) {
            ReplyParse::Strict(reply) => assert_eq!(reply.flashcards[0].topic, "Cells"),
            other => panic!("expected strict parse, got {:?}", other),
        }
    }

    #[test]
    fn fenced_json_is_extracted() {
        let raw = "Here you go:\n```json\n{\"questions\":[{\"question\":\"2+2?\",\"choices\":[\"1\",\"2\",\"3\",\"4\"],\"answer_index\":3,\"topic\":\"Math\"}]}\n```\nGood luck!";
        match parse_reply::<QuizReply>(raw) {
            ReplyParse::Extracted(reply) => {
                assert_eq!(reply.questions.len(), 1);
                assert_eq!(reply.questions[0].answer_index, 3);
            }
            other => panic!("expected extraction, got {:?}", other),
        }
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_object() {
        let raw = r#"Sure! {"flashcards":[{"topic":"Sets","question":"What is {}?","answer":"The empty set }"}]} trailing"#;
        let reply = parse_reply::<FlashcardsReply>(raw).into_result().unwrap();
        assert_eq!(reply.flashcards[0].question, "What is {}?");
        assert_eq!(reply.flashcards[0].answer, "The empty set }");
    }

    #[test]
    fn unclosed_brace_is_skipped_for_a_later_object() {
        assert_eq!(first_balanced_object(r#"{ oops {"a":1} "#), Some(r#"{"a":1}"#));
        assert_eq!(first_balanced_object("no braces here"), None);
        assert_eq!(first_balanced_object("{ never closed"), None);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_reply::<FlashcardsReply>("I cannot help with that.")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationParse(_)));
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        let parsed = parse_reply::<FlashcardsReply>(r#"{"cards":[]}"#);
        assert!(matches!(parsed, ReplyParse::Unparseable { .. }));
    }
}
