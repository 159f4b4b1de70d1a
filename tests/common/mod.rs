// Shared harness: in-memory database, router, and a scripted model backend.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use study_deck::ai::CompletionBackend;
use study_deck::auth::PRINCIPAL_HEADER;
use study_deck::db::{self, DbPool};
use study_deck::error::AppError;
use study_deck::generation::AudioUpload;
use study_deck::models::Language;
use study_deck::{app, AppState};

pub const USER: &str = "user-1";
pub const OTHER_USER: &str = "user-2";

/// Answers every completion with a fixed reply and counts calls.
#[derive(Default)]
pub struct StubBackend {
    completion: Mutex<String>,
    transcript: Mutex<String>,
    prompts: Mutex<Vec<String>>,
    completions: AtomicUsize,
    transcriptions: AtomicUsize,
}

impl StubBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_with(&self, reply: &str) {
        *self.completion.lock().unwrap() = reply.to_string();
    }

    pub fn transcribe_as(&self, text: &str) {
        *self.transcript.lock().unwrap() = text.to_string();
    }

    pub fn completion_calls(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn transcription_calls(&self) -> usize {
        self.transcriptions.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, AppError> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.completion.lock().unwrap().clone())
    }

    async fn transcribe(&self, _audio: &AudioUpload, _language: Language) -> Result<String, AppError> {
        self.transcriptions.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.lock().unwrap().clone())
    }
}

pub async fn setup_pool() -> DbPool {
    let pool = db::init_db("sqlite::memory:").await.expect("Failed to connect to test database");
    db::migrate(&pool).await.expect("Failed to run migrations");
    pool
}

pub async fn setup_app() -> (Router, Arc<StubBackend>) {
    let pool = setup_pool().await;
    let backend = StubBackend::new();
    (app(AppState::new(pool, backend.clone())), backend)
}

/// Sends one request as `user` (or anonymously) and returns status and JSON body.
pub async fn request_as(app: &Router, user: Option<&str>, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
    if let Some(user) = user {
        builder = builder.header(PRINCIPAL_HEADER, user);
    }
    let request = builder.body(Body::from(serde_json::to_vec(&body).unwrap())).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(json!({}));
    (status, body)
}

pub async fn request(app: &Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    request_as(app, Some(USER), method, uri, body).await
}

pub async fn create_class(app: &Router, name: &str) -> i64 {
    let (status, body) = request(app, Method::POST, "/api/classes", json!({ "name": name })).await;
    assert_eq!(status, StatusCode::CREATED, "create class failed: {}", body);
    body["id"].as_i64().expect("class id should be a number")
}

pub async fn create_note(app: &Router, class_id: i64, content: &str) -> i64 {
    let uri = format!("/api/classes/{}/notes", class_id);
    let (status, body) = request(app, Method::POST, &uri, json!({ "content": content })).await;
    assert_eq!(status, StatusCode::CREATED, "create note failed: {}", body);
    body["id"].as_i64().expect("note id should be a number")
}

/// Five questions whose correct indices are `[0, 1, 2, 0, 0]`.
pub fn five_question_reply() -> String {
    let questions: Vec<Value> = [0, 1, 2, 0, 0]
        .iter()
        .enumerate()
        .map(|(i, correct)| {
            json!({
                "question": format!("Question {}?", i + 1),
                "choices": ["A", "B", "C", "D"],
                "answer_index": correct,
                "topic": if i % 2 == 0 { "Cells" } else { "Genetics" },
            })
        })
        .collect();
    json!({ "questions": questions }).to_string()
}
