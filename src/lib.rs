// src/lib.rs
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
mod handlers;
pub mod models;
pub mod quiz_runtime;
pub mod workspace;

use crate::ai::CompletionBackend;
use crate::db::DbPool;
use crate::generation::MAX_AUDIO_BYTES;

// Base64 inflates audio by 4/3. Twice that keeps oversized uploads reaching
// the decoded-size check, which answers with a 400 naming the limit.
const BODY_LIMIT: usize = 2 * (MAX_AUDIO_BYTES / 3 * 4) + 64 * 1024;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub ai: Arc<dyn CompletionBackend>,
}

impl AppState {
    pub fn new(pool: DbPool, ai: Arc<dyn CompletionBackend>) -> Self {
        Self { pool, ai }
    }
}

pub fn app(state: AppState) -> Router {
    use handlers::*;

    let api = Router::new()
        .route("/health", get(health))
        // classes
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/:id", put(update_class).delete(delete_class))
        // notes
        .route("/classes/:id/notes", get(list_notes).post(create_note))
        .route("/classes/:id/notes/transcribe", post(transcribe_note))
        .route("/notes/:id", put(update_note).delete(delete_note))
        // topics
        .route("/classes/:id/topics", get(list_topics).post(create_topic))
        .route("/topics/:id", put(update_topic).delete(delete_topic))
        // flashcards
        .route(
            "/classes/:id/flashcards",
            get(list_flashcards).post(create_flashcards).delete(delete_topic_group),
        )
        .route("/classes/:id/flashcards/generate", post(generate_flashcards))
        .route("/flashcards/:id", put(update_flashcard).delete(delete_flashcard))
        // quizzes
        .route("/classes/:id/quizzes", get(list_quizzes))
        .route("/classes/:id/quizzes/generate", post(generate_quiz))
        .route("/quizzes/:id", get(get_quiz).delete(delete_quiz))
        .route("/quizzes/:id/attempts", post(grade_attempt))
        // AI functions
        .route("/functions/generate-flashcards", post(fn_generate_flashcards))
        .route("/functions/generate-quiz", post(fn_generate_quiz))
        .route("/functions/transcribe-audio", post(fn_transcribe_audio));

    tracing::info!("API routes registered under /api");

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
