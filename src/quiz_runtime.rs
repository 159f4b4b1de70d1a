//! Answering and scoring one quiz attempt.
//!
//! `Browsing` → `Answering` → `Graded`. An attempt lives only in memory; going
//! back to `Browsing` discards it and starting again resets every slot.

use serde::Serialize;
use thiserror::Error;

use crate::error::AppError;
use crate::models::{Quiz, CHOICES_PER_QUESTION};

/// Slot value for a question that has no answer yet.
pub const UNANSWERED: i32 = -1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuizRuntimeError {
    #[error("no quiz is being answered")]
    NotAnswering,
    #[error("{unanswered} question(s) still unanswered")]
    Incomplete { unanswered: usize },
    #[error("question {0} does not exist")]
    NoSuchQuestion(usize),
    #[error("choice {0} is out of range")]
    NoSuchChoice(i32),
    #[error("expected {expected} answers, got {got}")]
    AnswerCount { expected: usize, got: usize },
}

impl From<QuizRuntimeError> for AppError {
    fn from(err: QuizRuntimeError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub quiz_id: i64,
    pub correct: usize,
    pub total: usize,
    /// Percentage, rounded to the nearest integer.
    pub score: u32,
    /// Per question, in quiz order.
    pub outcomes: Vec<bool>,
    pub answers: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum QuizRuntime {
    #[default]
    Browsing,
    Answering {
        quiz: Quiz,
        answers: Vec<i32>,
    },
    Graded {
        quiz: Quiz,
        result: QuizResult,
    },
}

/// `round(100 × correct / total)`, zero for an empty quiz.
pub fn score_percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * correct as f64 / total as f64).round() as u32
}

pub fn grade(quiz: &Quiz, answers: &[i32]) -> QuizResult {
    let outcomes: Vec<bool> = quiz
        .questions
        .iter()
        .zip(answers)
        .map(|(q, a)| q.answer_index == *a)
        .collect();
    let correct = outcomes.iter().filter(|ok| **ok).count();
    let total = quiz.questions.len();
    QuizResult {
        quiz_id: quiz.id,
        correct,
        total,
        score: score_percent(correct, total),
        outcomes,
        answers: answers.to_vec(),
    }
}

impl QuizRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters `Answering` with every slot unanswered, replacing any attempt
    /// in progress or graded.
    pub fn start(&mut self, quiz: Quiz) {
        let answers = vec![UNANSWERED; quiz.questions.len()];
        *self = QuizRuntime::Answering { quiz, answers };
    }

    pub fn answer(&mut self, question: usize, choice: i32) -> Result<(), QuizRuntimeError> {
        let QuizRuntime::Answering { answers, .. } = self else {
            return Err(QuizRuntimeError::NotAnswering);
        };
        if !(0..CHOICES_PER_QUESTION as i32).contains(&choice) {
            return Err(QuizRuntimeError::NoSuchChoice(choice));
        }
        let slot = answers
            .get_mut(question)
            .ok_or(QuizRuntimeError::NoSuchQuestion(question))?;
        *slot = choice;
        Ok(())
    }

    /// Fills slots from a full answer sheet. `UNANSWERED` entries are left empty.
    pub fn answer_all(&mut self, sheet: &[i32]) -> Result<(), QuizRuntimeError> {
        let expected = match self {
            QuizRuntime::Answering { answers, .. } => answers.len(),
            _ => return Err(QuizRuntimeError::NotAnswering),
        };
        if sheet.len() != expected {
            return Err(QuizRuntimeError::AnswerCount {
                expected,
                got: sheet.len(),
            });
        }
        for (question, choice) in sheet.iter().enumerate() {
            if *choice != UNANSWERED {
                self.answer(question, *choice)?;
            }
        }
        Ok(())
    }

    pub fn unanswered(&self) -> usize {
        match self {
            QuizRuntime::Answering { answers, .. } => answers.iter().filter(|a| **a == UNANSWERED).count(),
            _ => 0,
        }
    }

    /// `Answering → Graded`, only once no slot is unanswered.
    pub fn submit(&mut self) -> Result<&QuizResult, QuizRuntimeError> {
        let unanswered = self.unanswered();
        let result = match self {
            QuizRuntime::Answering { .. } if unanswered > 0 => {
                return Err(QuizRuntimeError::Incomplete { unanswered });
            }
            QuizRuntime::Answering { quiz, answers } => grade(quiz, answers),
            _ => return Err(QuizRuntimeError::NotAnswering),
        };

        if let QuizRuntime::Answering { quiz, .. } = std::mem::take(self) {
            *self = QuizRuntime::Graded { quiz, result };
        }
        self.result().ok_or(QuizRuntimeError::NotAnswering)
    }

    /// Back to the list, dropping any attempt in progress or graded.
    pub fn close(&mut self) {
        *self = QuizRuntime::Browsing;
    }

    /// Closes the attempt when it belongs to `quiz_id`, e.g. after that quiz was deleted.
    pub fn forget_quiz(&mut self, quiz_id: i64) {
        if self.active_quiz().map(|q| q.id) == Some(quiz_id) {
            self.close();
        }
    }

    pub fn active_quiz(&self) -> Option<&Quiz> {
        match self {
            QuizRuntime::Browsing => None,
            QuizRuntime::Answering { quiz, .. } | QuizRuntime::Graded { quiz, .. } => Some(quiz),
        }
    }

    pub fn result(&self) -> Option<&QuizResult> {
        match self {
            QuizRuntime::Graded { result, .. } => Some(result),
            _ => None,
        }
    }
}
