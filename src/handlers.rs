// src/handlers.rs
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::db;
use crate::error::AppError;
use crate::generation::{self, AudioUpload};
use crate::models::{
    require_text, validate_class_name, AttemptPayload, Class, CreateClassPayload, CreateNotePayload, Flashcard,
    FlashcardsReply, FlashcardsRequest, GenerateFlashcardsPayload, GenerateQuizPayload, NewFlashcard, Note, Quiz,
    QuizReply, QuizRequest, Topic, TopicFilter, TopicPayload, TranscribePayload, TranscriptionReply,
    UpdateClassPayload, UpdateFlashcardPayload, UpdateNotePayload,
};
use crate::quiz_runtime::{QuizResult, QuizRuntime};
use crate::AppState;

type Created<T> = (StatusCode, Json<T>);

fn created<T>(value: T) -> Created<T> {
    (StatusCode::CREATED, Json(value))
}

// 204 when a row matched, 404 otherwise
fn no_content_or(found: bool, what: &'static str) -> Result<StatusCode, AppError> {
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(what))
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "study-deck" }))
}

// --- Classes ---

pub async fn list_classes(State(state): State<AppState>, principal: Principal) -> Result<Json<Vec<Class>>, AppError> {
    Ok(Json(db::list_classes(&state.pool, &principal).await?))
}

pub async fn create_class(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CreateClassPayload>,
) -> Result<Created<Class>, AppError> {
    let existing = db::list_classes(&state.pool, &principal).await?;
    let name = validate_class_name(&payload.name, &existing, None)?;
    let class = db::create_class(&state.pool, &principal, &name).await?;
    tracing::info!(class_id = class.id, "class created");
    Ok(created(class))
}

pub async fn update_class(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Json(payload): Json<UpdateClassPayload>,
) -> Result<StatusCode, AppError> {
    let existing = db::list_classes(&state.pool, &principal).await?;
    let name = validate_class_name(&payload.name, &existing, Some(class_id))?;
    no_content_or(db::update_class(&state.pool, &principal, class_id, &name).await?, "class")
}

pub async fn delete_class(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    no_content_or(db::delete_class(&state.pool, &principal, class_id).await?, "class")
}

// --- Notes ---

pub async fn list_notes(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
) -> Result<Json<Vec<Note>>, AppError> {
    Ok(Json(db::list_notes(&state.pool, &principal, class_id).await?))
}

pub async fn create_note(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Json(payload): Json<CreateNotePayload>,
) -> Result<Created<Note>, AppError> {
    let content = require_text("content", &payload.content)?;
    let source = payload.source.unwrap_or_default();
    let note = db::create_note(&state.pool, &principal, class_id, &content, source).await?;
    Ok(created(note))
}

pub async fn update_note(
    State(state): State<AppState>,
    principal: Principal,
    Path(note_id): Path<i64>,
    Json(payload): Json<UpdateNotePayload>,
) -> Result<StatusCode, AppError> {
    let content = require_text("content", &payload.content)?;
    no_content_or(db::update_note(&state.pool, &principal, note_id, &content).await?, "note")
}

pub async fn delete_note(
    State(state): State<AppState>,
    principal: Principal,
    Path(note_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    no_content_or(db::delete_note(&state.pool, &principal, note_id).await?, "note")
}

// Audio in, note out
pub async fn transcribe_note(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Json(payload): Json<TranscribePayload>,
) -> Result<Created<Note>, AppError> {
    let audio = AudioUpload::from_data_url(&payload.audio)?;
    let note = generation::transcribe_to_note(
        &state.pool,
        state.ai.as_ref(),
        &principal,
        class_id,
        &audio,
        payload.language,
    )
    .await?;
    Ok(created(note))
}

// --- Topics ---

pub async fn list_topics(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
) -> Result<Json<Vec<Topic>>, AppError> {
    Ok(Json(db::list_topics(&state.pool, &principal, class_id).await?))
}

pub async fn create_topic(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Json(payload): Json<TopicPayload>,
) -> Result<Created<Topic>, AppError> {
    let name = require_text("topic name", &payload.name)?;
    Ok(created(db::create_topic(&state.pool, &principal, class_id, &name).await?))
}

pub async fn update_topic(
    State(state): State<AppState>,
    principal: Principal,
    Path(topic_id): Path<i64>,
    Json(payload): Json<TopicPayload>,
) -> Result<StatusCode, AppError> {
    let name = require_text("topic name", &payload.name)?;
    no_content_or(db::update_topic(&state.pool, &principal, topic_id, &name).await?, "topic")
}

pub async fn delete_topic(
    State(state): State<AppState>,
    principal: Principal,
    Path(topic_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    no_content_or(db::delete_topic(&state.pool, &principal, topic_id).await?, "topic")
}

// --- Flashcards ---

pub async fn list_flashcards(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Query(filter): Query<TopicFilter>,
) -> Result<Json<Vec<Flashcard>>, AppError> {
    let cards = db::list_flashcards(&state.pool, &principal, class_id, filter.topic.as_deref()).await?;
    Ok(Json(cards))
}

pub async fn create_flashcards(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Json(batch): Json<Vec<NewFlashcard>>,
) -> Result<Created<Vec<Flashcard>>, AppError> {
    if batch.is_empty() {
        return Err(AppError::Validation("no flashcards given".to_string()));
    }
    let cards = batch
        .into_iter()
        .map(NewFlashcard::normalized)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(created(db::create_flashcards(&state.pool, &principal, class_id, &cards).await?))
}

// Removes every card carrying the topic label
pub async fn delete_topic_group(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Query(filter): Query<TopicFilter>,
) -> Result<Json<Value>, AppError> {
    let topic = filter
        .topic
        .ok_or_else(|| AppError::Validation("topic is required".to_string()))?;
    let deleted = db::delete_flashcards_by_topic(&state.pool, &principal, class_id, &topic).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn generate_flashcards(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Json(payload): Json<GenerateFlashcardsPayload>,
) -> Result<Created<Vec<Flashcard>>, AppError> {
    let cards = generation::generate_flashcards(
        &state.pool,
        state.ai.as_ref(),
        &principal,
        class_id,
        &payload.topics,
        payload.language,
    )
    .await?;
    Ok(created(cards))
}

pub async fn update_flashcard(
    State(state): State<AppState>,
    principal: Principal,
    Path(flashcard_id): Path<i64>,
    Json(payload): Json<UpdateFlashcardPayload>,
) -> Result<StatusCode, AppError> {
    let fields = payload.normalized()?;
    no_content_or(
        db::update_flashcard(&state.pool, &principal, flashcard_id, &fields).await?,
        "flashcard",
    )
}

pub async fn delete_flashcard(
    State(state): State<AppState>,
    principal: Principal,
    Path(flashcard_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    no_content_or(db::delete_flashcard(&state.pool, &principal, flashcard_id).await?, "flashcard")
}

// --- Quizzes ---

pub async fn list_quizzes(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
) -> Result<Json<Vec<Quiz>>, AppError> {
    Ok(Json(db::list_quizzes(&state.pool, &principal, class_id).await?))
}

pub async fn generate_quiz(
    State(state): State<AppState>,
    principal: Principal,
    Path(class_id): Path<i64>,
    Json(payload): Json<GenerateQuizPayload>,
) -> Result<Created<Quiz>, AppError> {
    let quiz = generation::generate_quiz(
        &state.pool,
        state.ai.as_ref(),
        &principal,
        class_id,
        payload.source,
        &payload.topics,
        payload.language,
    )
    .await?;
    Ok(created(quiz))
}

pub async fn get_quiz(
    State(state): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<i64>,
) -> Result<Json<Quiz>, AppError> {
    db::get_quiz(&state.pool, &principal, quiz_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("quiz"))
}

pub async fn delete_quiz(
    State(state): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    no_content_or(db::delete_quiz(&state.pool, &principal, quiz_id).await?, "quiz")
}

/// Grades one complete answer sheet. Nothing about the attempt is stored.
pub async fn grade_attempt(
    State(state): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<AttemptPayload>,
) -> Result<Json<QuizResult>, AppError> {
    let quiz = db::get_quiz(&state.pool, &principal, quiz_id)
        .await?
        .ok_or(AppError::NotFound("quiz"))?;

    let mut runtime = QuizRuntime::new();
    runtime.start(quiz);
    runtime.answer_all(&payload.answers)?;
    let result = runtime.submit()?.clone();
    Ok(Json(result))
}

// --- AI functions ---

pub async fn fn_generate_flashcards(
    State(state): State<AppState>,
    _principal: Principal,
    Json(request): Json<FlashcardsRequest>,
) -> Result<Json<FlashcardsReply>, AppError> {
    let flashcards =
        generation::request_flashcards(state.ai.as_ref(), &request.notes, &request.topics, request.language).await?;
    Ok(Json(FlashcardsReply { flashcards }))
}

pub async fn fn_generate_quiz(
    State(state): State<AppState>,
    _principal: Principal,
    Json(request): Json<QuizRequest>,
) -> Result<Json<QuizReply>, AppError> {
    let questions = generation::request_quiz(
        state.ai.as_ref(),
        &request.content,
        &request.topics,
        request.language,
        request.source,
    )
    .await?;
    Ok(Json(QuizReply { questions }))
}

pub async fn fn_transcribe_audio(
    State(state): State<AppState>,
    _principal: Principal,
    Json(payload): Json<TranscribePayload>,
) -> Result<Json<TranscriptionReply>, AppError> {
    let audio = AudioUpload::from_data_url(&payload.audio)?;
    let text = generation::request_transcription(state.ai.as_ref(), &audio, payload.language).await?;
    Ok(Json(TranscriptionReply { text }))
}
