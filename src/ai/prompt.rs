//! Prompt templates and source-material rendering.

use crate::models::{Flashcard, Language, Note, QuizSource};

pub const FLASHCARD_TARGET: usize = 10;
pub const QUIZ_QUESTION_COUNT: usize = 5;

pub const FLASHCARD_SYSTEM: &str =
    "You are a helpful study assistant that generates flashcards in JSON format.";
pub const QUIZ_SYSTEM: &str =
    "You are a helpful study assistant that generates quiz questions in JSON format.";

/// Note bodies separated by blank lines, in the order given.
pub fn join_notes(notes: &[Note]) -> String {
    notes
        .iter()
        .map(|n| n.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One `Topic/Q/A` block per card, separated by blank lines.
pub fn render_flashcards(cards: &[Flashcard]) -> String {
    cards
        .iter()
        .map(|c| format!("Topic: {}\nQ: {}\nA: {}", c.topic, c.question, c.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn flashcard_prompt(notes: &str, topics: &[String], language: Language) -> String {
    let focus = if topics.is_empty() {
        "Cover the key concepts from the notes.".to_string()
    } else {
        format!("Focus specifically on these topics: {}", topics.join(", "))
    };

    format!(
        r#"You are an expert educator creating study flashcards. Generate {count} concise, high-quality flashcards based on the following notes.

{focus}

Notes:
{notes}

Requirements:
- Generate flashcards in {language}
- Each flashcard should have a clear question and concise answer
- Assign each flashcard to one of the topics provided (or create relevant topic names if none provided)
- Focus on important concepts, definitions, and key facts
- Make questions specific and answers clear

Return ONLY a valid JSON object in this exact format (no markdown, no code blocks):
{{
  "flashcards": [
    {{
      "topic": "Topic Name",
      "question": "Question text?",
      "answer": "Answer text"
    }}
  ]
}}"#,
        count = FLASHCARD_TARGET,
        language = language.display_name(),
    )
}

pub fn quiz_prompt(content: &str, topics: &[String], language: Language, source: QuizSource) -> String {
    let material = match source {
        QuizSource::Notes => "notes",
        QuizSource::Flashcards => "flashcards",
    };
    let focus = if topics.is_empty() {
        String::new()
    } else {
        format!("Focus on these topics: {}", topics.join(", "))
    };

    format!(
        r#"You are an expert educator creating a practice quiz. Generate {count} high-quality multiple-choice questions based on the following {material}.

{focus}

Content:
{content}

Requirements:
- Generate questions in {language}
- Each question should have 4 answer choices
- Exactly one answer must be correct
- Include the index of the correct answer (0-3)
- Include the topic for each question
- Make questions challenging but fair

Return ONLY a valid JSON object in this exact format (no markdown, no code blocks):
{{
  "questions": [
    {{
      "question": "Question text?",
      "choices": ["Choice A", "Choice B", "Choice C", "Choice D"],
      "answer_index": 0,
      "topic": "Topic Name"
    }}
  ]
}}"#,
        count = QUIZ_QUESTION_COUNT,
        language = language.display_name(),
    )
}
