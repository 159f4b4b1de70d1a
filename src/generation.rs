//! Generation requestors: flashcards, quizzes and transcription.
//!
//! The `request_*` functions talk to the model only. The `generate_*` and
//! `transcribe_to_note` flows load source material from the gateway, call a
//! requestor and store what comes back.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::ai::parse::parse_reply;
use crate::ai::prompt::{self, FLASHCARD_SYSTEM, QUIZ_SYSTEM};
use crate::ai::CompletionBackend;
use crate::auth::Principal;
use crate::db::{self, DbPool};
use crate::error::AppError;
use crate::models::{
    parse_topic_hints, Flashcard, Language, NewFlashcard, Note, NoteSource, Quiz, QuizQuestion, QuizSource,
};

// --- Audio upload limits ---
pub const ALLOWED_AUDIO_TYPES: [&str; 4] = ["audio/mpeg", "audio/wav", "audio/mp4", "audio/x-m4a"];
pub const MAX_AUDIO_BYTES: usize = 25_000_000;

/// A validated audio file held fully in memory.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    /// Checks type and size without looking at the content.
    pub fn check(mime_type: &str, size: usize) -> Result<(), AppError> {
        if !ALLOWED_AUDIO_TYPES.contains(&mime_type) {
            return Err(AppError::Validation(format!(
                "unsupported audio type \"{}\": upload an MP3, WAV or M4A file",
                mime_type
            )));
        }
        if size > MAX_AUDIO_BYTES {
            return Err(AppError::Validation(format!(
                "audio file is {} bytes, the limit is {} bytes",
                size, MAX_AUDIO_BYTES
            )));
        }
        Ok(())
    }

    pub fn new(mime_type: &str, bytes: Vec<u8>) -> Result<Self, AppError> {
        Self::check(mime_type, bytes.len())?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    /// Parses `data:<mime>;base64,<payload>`.
    ///
    /// Type and an upper bound on size are checked before decoding.
    pub fn from_data_url(data_url: &str) -> Result<Self, AppError> {
        let malformed = || AppError::Validation("audio must be a base64 data URL".to_string());

        let rest = data_url.trim().strip_prefix("data:").ok_or_else(malformed)?;
        let (header, payload) = rest.split_once(',').ok_or_else(malformed)?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(malformed)?;

        let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
        let decoded_len = (payload.len() / 4 * 3).saturating_sub(padding);
        Self::check(mime_type, decoded_len)?;

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| AppError::Validation(format!("audio is not valid base64: {}", e)))?;
        Self::new(mime_type, bytes)
    }

    pub fn file_name(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/wav" => "audio.wav",
            "audio/mp4" | "audio/x-m4a" => "audio.m4a",
            _ => "audio.mp3",
        }
    }
}

// --- Requestors ---

// Hints may arrive as one comma separated entry
fn split_hints(topics: &[String]) -> Vec<String> {
    topics.iter().flat_map(|t| parse_topic_hints(t)).collect()
}

// Items stay untyped until each one is checked on its own
#[derive(Deserialize)]
struct RawFlashcards {
    flashcards: Vec<Value>,
}

#[derive(Deserialize)]
struct RawQuestions {
    questions: Vec<Value>,
}

/// Keeps the items that deserialize into `T` and pass `valid`; the rest are logged and dropped.
fn keep_valid<T: DeserializeOwned>(items: Vec<Value>, kind: &str, valid: impl Fn(&T) -> bool) -> Vec<T> {
    let total = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<T>(item).ok())
        .filter(|item| valid(item))
        .collect();
    if kept.len() < total {
        tracing::warn!(dropped = total - kept.len(), kind, "discarded malformed generated items");
    }
    kept
}

pub async fn request_flashcards(
    backend: &dyn CompletionBackend,
    notes: &str,
    topics: &[String],
    language: Language,
) -> Result<Vec<NewFlashcard>, AppError> {
    if notes.trim().is_empty() {
        return Err(AppError::Validation("add some notes before generating flashcards".to_string()));
    }

    let reply = backend
        .complete(FLASHCARD_SYSTEM, &prompt::flashcard_prompt(notes, &split_hints(topics), language))
        .await?;
    let parsed: RawFlashcards = parse_reply(&reply).into_result()?;

    // topics come back exactly as the model named them
    let cards = keep_valid(parsed.flashcards, "flashcard", |c: &NewFlashcard| {
        !c.question.trim().is_empty() && !c.answer.trim().is_empty()
    });
    if cards.is_empty() {
        return Err(AppError::Generation("No flashcards received".to_string()));
    }
    Ok(cards)
}

pub async fn request_quiz(
    backend: &dyn CompletionBackend,
    content: &str,
    topics: &[String],
    language: Language,
    source: QuizSource,
) -> Result<Vec<QuizQuestion>, AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "no {} to build a quiz from",
            match source {
                QuizSource::Notes => "notes",
                QuizSource::Flashcards => "flashcards",
            }
        )));
    }

    let reply = backend
        .complete(QUIZ_SYSTEM, &prompt::quiz_prompt(content, &split_hints(topics), language, source))
        .await?;
    let parsed: RawQuestions = parse_reply(&reply).into_result()?;

    let questions: Vec<QuizQuestion> = keep_valid(parsed.questions, "quiz question", QuizQuestion::is_well_formed);
    if questions.is_empty() {
        return Err(AppError::Generation("No questions received".to_string()));
    }
    Ok(questions)
}

pub async fn request_transcription(
    backend: &dyn CompletionBackend,
    audio: &AudioUpload,
    language: Language,
) -> Result<String, AppError> {
    let text = backend.transcribe(audio, language).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Generation("No transcription received".to_string()));
    }
    Ok(text.to_string())
}

// --- Flows ---

pub async fn generate_flashcards(
    pool: &DbPool,
    backend: &dyn CompletionBackend,
    owner: &Principal,
    class_id: i64,
    topics: &[String],
    language: Language,
) -> Result<Vec<Flashcard>, AppError> {
    let notes = db::list_notes(pool, owner, class_id).await?;
    ensure_class_exists(pool, owner, class_id, notes.is_empty()).await?;

    let cards = request_flashcards(backend, &prompt::join_notes(&notes), topics, language).await?;
    let created = db::create_flashcards(pool, owner, class_id, &cards).await?;
    tracing::info!(class_id, count = created.len(), "stored generated flashcards");
    Ok(created)
}

pub async fn generate_quiz(
    pool: &DbPool,
    backend: &dyn CompletionBackend,
    owner: &Principal,
    class_id: i64,
    source: QuizSource,
    topics: &[String],
    language: Language,
) -> Result<Quiz, AppError> {
    let content = match source {
        QuizSource::Notes => {
            let notes = db::list_notes(pool, owner, class_id).await?;
            ensure_class_exists(pool, owner, class_id, notes.is_empty()).await?;
            prompt::join_notes(&notes)
        }
        QuizSource::Flashcards => {
            let cards = db::list_flashcards(pool, owner, class_id, None).await?;
            ensure_class_exists(pool, owner, class_id, cards.is_empty()).await?;
            prompt::render_flashcards(&cards)
        }
    };

    let questions = request_quiz(backend, &content, topics, language, source).await?;
    let title = format!("Quiz - {}", Utc::now().format("%Y-%m-%d"));
    let quiz = db::create_quiz(pool, owner, class_id, &title, &questions).await?;
    tracing::info!(class_id, quiz_id = quiz.id, questions = quiz.questions.len(), "stored generated quiz");
    Ok(quiz)
}

pub async fn transcribe_to_note(
    pool: &DbPool,
    backend: &dyn CompletionBackend,
    owner: &Principal,
    class_id: i64,
    audio: &AudioUpload,
    language: Language,
) -> Result<Note, AppError> {
    ensure_class_exists(pool, owner, class_id, true).await?;
    let text = request_transcription(backend, audio, language).await?;
    let note = db::create_note(pool, owner, class_id, &text, NoteSource::Audio).await?;
    tracing::info!(class_id, note_id = note.id, chars = text.len(), "stored transcription");
    Ok(note)
}

// An empty listing cannot tell "no rows" from "not your class"; look it up then
async fn ensure_class_exists(pool: &DbPool, owner: &Principal, class_id: i64, listing_empty: bool) -> Result<(), AppError> {
    if listing_empty && db::get_class(pool, owner, class_id).await?.is_none() {
        return Err(AppError::NotFound("class"));
    }
    Ok(())
}
