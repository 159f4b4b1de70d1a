use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

// --- Stored records ---

// A user-owned folder grouping notes, flashcards and quizzes on one subject
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq)]
pub struct Class {
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq)]
pub struct Note {
    pub id: i64,
    pub class_id: i64,
    pub content: String,
    pub source: NoteSource,
    pub created_at: DateTime<Utc>,
}

/// Where a note's text came from.
#[derive(Serialize, Deserialize, sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NoteSource {
    #[default]
    Manual,
    Audio,
}

// Topic rows are an optional index; flashcards and questions carry their own label
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq)]
pub struct Topic {
    pub id: i64,
    pub class_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq)]
pub struct Flashcard {
    pub id: i64,
    pub class_id: i64,
    pub topic: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Quiz {
    pub id: i64,
    pub class_id: i64,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
}

/// One four-choice question embedded in a [`Quiz`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuizQuestion {
    pub question: String,
    pub choices: Vec<String>,
    pub answer_index: i32,
    #[serde(default)]
    pub topic: String,
}

pub const CHOICES_PER_QUESTION: usize = 4;

impl QuizQuestion {
    /// Exactly four choices and a correct index pointing at one of them.
    pub fn is_well_formed(&self) -> bool {
        self.choices.len() == CHOICES_PER_QUESTION
            && (0..CHOICES_PER_QUESTION as i32).contains(&self.answer_index)
            && !self.question.trim().is_empty()
    }
}

// --- Request payloads ---

#[derive(Deserialize, Debug)]
pub struct CreateClassPayload {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateClassPayload {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct CreateNotePayload {
    pub content: String,
    pub source: Option<NoteSource>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateNotePayload {
    pub content: String,
}

#[derive(Deserialize, Debug)]
pub struct TopicPayload {
    pub name: String,
}

// A flashcard before it is stored; also the item shape the model replies with
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewFlashcard {
    #[serde(default)]
    pub topic: String,
    pub question: String,
    pub answer: String,
}

impl NewFlashcard {
    /// Trims every field; question and answer must not end up empty.
    pub fn normalized(self) -> Result<Self, AppError> {
        Ok(Self {
            topic: self.topic.trim().to_string(),
            question: require_text("question", &self.question)?,
            answer: require_text("answer", &self.answer)?,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateFlashcardPayload {
    pub topic: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
}

impl UpdateFlashcardPayload {
    pub fn normalized(self) -> Result<Self, AppError> {
        Ok(Self {
            topic: self.topic.map(|t| t.trim().to_string()),
            question: self.question.map(|q| require_text("question", &q)).transpose()?,
            answer: self.answer.map(|a| require_text("answer", &a)).transpose()?,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct TopicFilter {
    pub topic: Option<String>,
}

/// Target language of generated material, by ISO code.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    Zh,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::Zh => "zh",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Es => "Spanish",
            Language::Fr => "French",
            Language::Zh => "Mandarin Chinese",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuizSource {
    #[default]
    Notes,
    Flashcards,
}

#[derive(Deserialize, Debug, Default)]
pub struct GenerateFlashcardsPayload {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Deserialize, Debug, Default)]
pub struct GenerateQuizPayload {
    #[serde(default)]
    pub source: QuizSource,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Deserialize, Debug)]
pub struct TranscribePayload {
    pub audio: String,
    #[serde(default)]
    pub language: Language,
}

#[derive(Deserialize, Debug)]
pub struct AttemptPayload {
    pub answers: Vec<i32>,
}

// --- Function endpoint shapes ---

#[derive(Serialize, Deserialize, Debug)]
pub struct FlashcardsRequest {
    pub notes: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct FlashcardsReply {
    pub flashcards: Vec<NewFlashcard>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct QuizRequest {
    pub content: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub source: QuizSource,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct QuizReply {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct TranscriptionReply {
    pub text: String,
}

// --- Field checks ---

/// Trims `value` and rejects it when nothing is left.
pub fn require_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Checks a class name against the classes the owner already has.
///
/// Names compare case-insensitively after trimming. `renaming` excludes the
/// class being renamed so keeping a name (or changing its case) is allowed.
pub fn validate_class_name(
    name: &str,
    existing: &[Class],
    renaming: Option<i64>,
) -> Result<String, AppError> {
    let name = require_text("class name", name)?;
    let lowered = name.to_lowercase();
    let taken = existing
        .iter()
        .filter(|c| Some(c.id) != renaming)
        .any(|c| c.name.trim().to_lowercase() == lowered);
    if taken {
        return Err(AppError::Validation(format!(
            "a class named \"{}\" already exists",
            name
        )));
    }
    Ok(name)
}

/// Splits a comma separated hint list the way the topic input field is entered.
pub fn parse_topic_hints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
