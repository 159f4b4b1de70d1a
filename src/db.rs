// src/db.rs
//! Persistence gateway: typed CRUD over the five collections.
//!
//! Listings are newest first. Every child collection is reached through a
//! class owned by the caller; rows under someone else's class look missing.
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::auth::Principal;
use crate::error::AppError;
use crate::models::{Class, Flashcard, NewFlashcard, Note, NoteSource, Quiz, QuizQuestion, Topic, UpdateFlashcardPayload};

pub type DbPool = SqlitePool;

type DbResult<T> = Result<T, AppError>;

// --- Error helper ---
fn map_serde_error(e: serde_json::Error) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

// --- Constants ---
const MAX_CONNECTIONS: u32 = 5;
const OWNED_CLASSES: &str = "class_id IN (SELECT id FROM classes WHERE owner_id = ?)";

// --- Initialization ---
pub async fn init_db(database_url: &str) -> DbResult<DbPool> {
    tracing::info!(database_url, "connecting to database");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // An in-memory database lives and dies with its single connection
    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?
    };
    Ok(pool)
}

// --- Migrations ---
pub async fn migrate(pool: &DbPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

async fn owns_class(pool: &DbPool, owner: &Principal, class_id: i64) -> DbResult<bool> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM classes WHERE id = ? AND owner_id = ?")
        .bind(class_id)
        .bind(owner.id())
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn require_class(pool: &DbPool, owner: &Principal, class_id: i64) -> DbResult<()> {
    if owns_class(pool, owner, class_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("class"))
    }
}

// --- Classes ---

pub async fn list_classes(pool: &DbPool, owner: &Principal) -> DbResult<Vec<Class>> {
    let classes = sqlx::query_as::<_, Class>(
        "SELECT id, owner_id, name, created_at, updated_at FROM classes
         WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(owner.id())
    .fetch_all(pool)
    .await?;
    Ok(classes)
}

pub async fn get_class(pool: &DbPool, owner: &Principal, class_id: i64) -> DbResult<Option<Class>> {
    let class = sqlx::query_as::<_, Class>(
        "SELECT id, owner_id, name, created_at, updated_at FROM classes WHERE id = ? AND owner_id = ?",
    )
    .bind(class_id)
    .bind(owner.id())
    .fetch_optional(pool)
    .await?;
    Ok(class)
}

pub async fn create_class(pool: &DbPool, owner: &Principal, name: &str) -> DbResult<Class> {
    let now = Utc::now();
    let class = sqlx::query_as::<_, Class>(
        r#"
        INSERT INTO classes (owner_id, name, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, owner_id, name, created_at, updated_at
        "#,
    )
    .bind(owner.id())
    .bind(name)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(class)
}

pub async fn update_class(pool: &DbPool, owner: &Principal, class_id: i64, name: &str) -> DbResult<bool> {
    let result = sqlx::query("UPDATE classes SET name = ?, updated_at = ? WHERE id = ? AND owner_id = ?")
        .bind(name)
        .bind(Utc::now())
        .bind(class_id)
        .bind(owner.id())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Children go with the class through `ON DELETE CASCADE`.
pub async fn delete_class(pool: &DbPool, owner: &Principal, class_id: i64) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM classes WHERE id = ? AND owner_id = ?")
        .bind(class_id)
        .bind(owner.id())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- Notes ---

pub async fn list_notes(pool: &DbPool, owner: &Principal, class_id: i64) -> DbResult<Vec<Note>> {
    let sql = format!(
        "SELECT id, class_id, content, source, created_at FROM notes
         WHERE class_id = ? AND {OWNED_CLASSES} ORDER BY created_at DESC, id DESC"
    );
    let notes = sqlx::query_as::<_, Note>(&sql)
        .bind(class_id)
        .bind(owner.id())
        .fetch_all(pool)
        .await?;
    Ok(notes)
}

pub async fn create_note(
    pool: &DbPool,
    owner: &Principal,
    class_id: i64,
    content: &str,
    source: NoteSource,
) -> DbResult<Note> {
    require_class(pool, owner, class_id).await?;
    let note = sqlx::query_as::<_, Note>(
        r#"
        INSERT INTO notes (class_id, content, source, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, class_id, content, source, created_at
        "#,
    )
    .bind(class_id)
    .bind(content)
    .bind(source)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(note)
}

pub async fn update_note(pool: &DbPool, owner: &Principal, note_id: i64, content: &str) -> DbResult<bool> {
    let sql = format!("UPDATE notes SET content = ? WHERE id = ? AND {OWNED_CLASSES}");
    let result = sqlx::query(&sql)
        .bind(content)
        .bind(note_id)
        .bind(owner.id())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_note(pool: &DbPool, owner: &Principal, note_id: i64) -> DbResult<bool> {
    delete_owned(pool, "notes", owner, note_id).await
}

// --- Topics ---

pub async fn list_topics(pool: &DbPool, owner: &Principal, class_id: i64) -> DbResult<Vec<Topic>> {
    let sql = format!(
        "SELECT id, class_id, name, created_at FROM topics
         WHERE class_id = ? AND {OWNED_CLASSES} ORDER BY created_at DESC, id DESC"
    );
    let topics = sqlx::query_as::<_, Topic>(&sql)
        .bind(class_id)
        .bind(owner.id())
        .fetch_all(pool)
        .await?;
    Ok(topics)
}

pub async fn create_topic(pool: &DbPool, owner: &Principal, class_id: i64, name: &str) -> DbResult<Topic> {
    require_class(pool, owner, class_id).await?;
    let topic = sqlx::query_as::<_, Topic>(
        "INSERT INTO topics (class_id, name, created_at) VALUES (?, ?, ?)
         RETURNING id, class_id, name, created_at",
    )
    .bind(class_id)
    .bind(name)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(topic)
}

pub async fn update_topic(pool: &DbPool, owner: &Principal, topic_id: i64, name: &str) -> DbResult<bool> {
    let sql = format!("UPDATE topics SET name = ? WHERE id = ? AND {OWNED_CLASSES}");
    let result = sqlx::query(&sql)
        .bind(name)
        .bind(topic_id)
        .bind(owner.id())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_topic(pool: &DbPool, owner: &Principal, topic_id: i64) -> DbResult<bool> {
    delete_owned(pool, "topics", owner, topic_id).await
}

// --- Flashcards ---

pub async fn list_flashcards(
    pool: &DbPool,
    owner: &Principal,
    class_id: i64,
    topic: Option<&str>,
) -> DbResult<Vec<Flashcard>> {
    let mut sql = format!(
        "SELECT id, class_id, topic, question, answer, created_at FROM flashcards
         WHERE class_id = ? AND {OWNED_CLASSES}"
    );
    if topic.is_some() {
        sql.push_str(" AND topic = ?");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let mut query = sqlx::query_as::<_, Flashcard>(&sql).bind(class_id).bind(owner.id());
    if let Some(t) = topic {
        query = query.bind(t);
    }
    Ok(query.fetch_all(pool).await?)
}

/// Inserts a whole batch or nothing. Returned rows keep the batch order.
pub async fn create_flashcards(
    pool: &DbPool,
    owner: &Principal,
    class_id: i64,
    cards: &[NewFlashcard],
) -> DbResult<Vec<Flashcard>> {
    require_class(pool, owner, class_id).await?;
    let created_at = Utc::now();

    let mut tx = pool.begin().await?;
    let mut created = Vec::with_capacity(cards.len());
    for card in cards {
        let row = sqlx::query_as::<_, Flashcard>(
            r#"
            INSERT INTO flashcards (class_id, topic, question, answer, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, class_id, topic, question, answer, created_at
            "#,
        )
        .bind(class_id)
        .bind(&card.topic)
        .bind(&card.question)
        .bind(&card.answer)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;
        created.push(row);
    }
    tx.commit().await?;
    Ok(created)
}

/// Fields left as `None` keep their stored value.
pub async fn update_flashcard(
    pool: &DbPool,
    owner: &Principal,
    flashcard_id: i64,
    fields: &UpdateFlashcardPayload,
) -> DbResult<bool> {
    let sql = format!(
        "UPDATE flashcards
         SET topic = COALESCE(?, topic), question = COALESCE(?, question), answer = COALESCE(?, answer)
         WHERE id = ? AND {OWNED_CLASSES}"
    );
    let result = sqlx::query(&sql)
        .bind(fields.topic.as_deref())
        .bind(fields.question.as_deref())
        .bind(fields.answer.as_deref())
        .bind(flashcard_id)
        .bind(owner.id())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_flashcard(pool: &DbPool, owner: &Principal, flashcard_id: i64) -> DbResult<bool> {
    delete_owned(pool, "flashcards", owner, flashcard_id).await
}

/// Removes a topic group and returns how many cards went with it.
pub async fn delete_flashcards_by_topic(
    pool: &DbPool,
    owner: &Principal,
    class_id: i64,
    topic: &str,
) -> DbResult<u64> {
    let sql = format!("DELETE FROM flashcards WHERE class_id = ? AND topic = ? AND {OWNED_CLASSES}");
    let result = sqlx::query(&sql)
        .bind(class_id)
        .bind(topic)
        .bind(owner.id())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// --- Quizzes ---

// questions are stored as a JSON document
#[derive(FromRow)]
struct QuizRow {
    id: i64,
    class_id: i64,
    title: String,
    questions: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuizRow> for Quiz {
    type Error = sqlx::Error;

    fn try_from(row: QuizRow) -> Result<Self, Self::Error> {
        let questions: Vec<QuizQuestion> = serde_json::from_str(&row.questions).map_err(map_serde_error)?;
        Ok(Quiz {
            id: row.id,
            class_id: row.class_id,
            title: row.title,
            questions,
            created_at: row.created_at,
        })
    }
}

pub async fn list_quizzes(pool: &DbPool, owner: &Principal, class_id: i64) -> DbResult<Vec<Quiz>> {
    let sql = format!(
        "SELECT id, class_id, title, questions, created_at FROM quizzes
         WHERE class_id = ? AND {OWNED_CLASSES} ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, QuizRow>(&sql)
        .bind(class_id)
        .bind(owner.id())
        .fetch_all(pool)
        .await?;

    let mut quizzes = Vec::with_capacity(rows.len());
    for row in rows {
        quizzes.push(Quiz::try_from(row)?);
    }
    Ok(quizzes)
}

pub async fn get_quiz(pool: &DbPool, owner: &Principal, quiz_id: i64) -> DbResult<Option<Quiz>> {
    let sql = format!("SELECT id, class_id, title, questions, created_at FROM quizzes WHERE id = ? AND {OWNED_CLASSES}");
    let row = sqlx::query_as::<_, QuizRow>(&sql)
        .bind(quiz_id)
        .bind(owner.id())
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(Some(Quiz::try_from(row)?)),
        None => Ok(None),
    }
}

pub async fn create_quiz(
    pool: &DbPool,
    owner: &Principal,
    class_id: i64,
    title: &str,
    questions: &[QuizQuestion],
) -> DbResult<Quiz> {
    require_class(pool, owner, class_id).await?;
    let questions_json = serde_json::to_string(questions).map_err(map_serde_error)?;

    let row = sqlx::query_as::<_, QuizRow>(
        r#"
        INSERT INTO quizzes (class_id, title, questions, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, class_id, title, questions, created_at
        "#,
    )
    .bind(class_id)
    .bind(title)
    .bind(questions_json)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(Quiz::try_from(row)?)
}

pub async fn delete_quiz(pool: &DbPool, owner: &Principal, quiz_id: i64) -> DbResult<bool> {
    delete_owned(pool, "quizzes", owner, quiz_id).await
}

// `table` is always one of the literals above
async fn delete_owned(pool: &DbPool, table: &'static str, owner: &Principal, id: i64) -> DbResult<bool> {
    let sql = format!("DELETE FROM {table} WHERE id = ? AND {OWNED_CLASSES}");
    let result = sqlx::query(&sql).bind(id).bind(owner.id()).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
