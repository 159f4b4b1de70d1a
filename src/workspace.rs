//! State behind one study view: the class list, the selected class and
//! per-class mirrors of notes, topics, flashcards and quizzes.
//!
//! Mirrors are read-through: the first read of a class loads it from the
//! gateway, and every later mutation merges the record the gateway returned
//! instead of fetching the collection again.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ai::CompletionBackend;
use crate::auth::Principal;
use crate::db::{self, DbPool};
use crate::error::AppError;
use crate::generation::{self, AudioUpload};
use crate::models::{
    require_text, validate_class_name, Class, Flashcard, Language, Note, NoteSource, Quiz, QuizSource, Topic,
    UpdateFlashcardPayload,
};
use crate::quiz_runtime::QuizRuntime;

/// Anything with a server-assigned id.
pub trait Record {
    fn id(&self) -> i64;
}

macro_rules! impl_record {
    ($($ty:ty),*) => {
        $(impl Record for $ty {
            fn id(&self) -> i64 {
                self.id
            }
        })*
    };
}

impl_record!(Class, Note, Topic, Flashcard, Quiz);

/// Newest-first lists keyed by parent id.
#[derive(Debug)]
pub struct CollectionCache<T> {
    entries: HashMap<i64, Vec<T>>,
}

impl<T> Default for CollectionCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Record> CollectionCache<T> {
    pub fn get(&self, parent: i64) -> Option<&[T]> {
        self.entries.get(&parent).map(Vec::as_slice)
    }

    pub fn is_loaded(&self, parent: i64) -> bool {
        self.entries.contains_key(&parent)
    }

    pub fn fill(&mut self, parent: i64, records: Vec<T>) {
        self.entries.insert(parent, records);
    }

    /// Puts new records in front, keeping their order. Ignored until the parent is loaded.
    pub fn prepend(&mut self, parent: i64, records: Vec<T>) {
        if let Some(list) = self.entries.get_mut(&parent) {
            list.splice(0..0, records);
        }
    }

    pub fn remove(&mut self, parent: i64, id: i64) {
        if let Some(list) = self.entries.get_mut(&parent) {
            list.retain(|r| r.id() != id);
        }
    }

    pub fn retain(&mut self, parent: i64, keep: impl FnMut(&T) -> bool) {
        if let Some(list) = self.entries.get_mut(&parent) {
            list.retain(keep);
        }
    }

    pub fn modify(&mut self, parent: i64, id: i64, change: impl FnOnce(&mut T)) {
        if let Some(record) = self
            .entries
            .get_mut(&parent)
            .and_then(|list| list.iter_mut().find(|r| r.id() == id))
        {
            change(record);
        }
    }

    pub fn invalidate(&mut self, parent: i64) {
        self.entries.remove(&parent);
    }
}

pub struct Workspace {
    pool: DbPool,
    backend: Arc<dyn CompletionBackend>,
    owner: Principal,
    classes: Option<Vec<Class>>,
    selected: Option<i64>,
    notes: CollectionCache<Note>,
    topics: CollectionCache<Topic>,
    flashcards: CollectionCache<Flashcard>,
    quizzes: CollectionCache<Quiz>,
    pub quiz: QuizRuntime,
}

impl Workspace {
    pub fn new(pool: DbPool, backend: Arc<dyn CompletionBackend>, owner: Principal) -> Self {
        Self {
            pool,
            backend,
            owner,
            classes: None,
            selected: None,
            notes: CollectionCache::default(),
            topics: CollectionCache::default(),
            flashcards: CollectionCache::default(),
            quizzes: CollectionCache::default(),
            quiz: QuizRuntime::new(),
        }
    }

    pub fn selected_class(&self) -> Option<i64> {
        self.selected
    }

    pub fn select_class(&mut self, class_id: Option<i64>) {
        if self.selected != class_id {
            self.quiz.close();
        }
        self.selected = class_id;
    }

    // --- Classes ---

    /// Loads the class list once; selects the newest class if nothing is selected.
    pub async fn classes(&mut self) -> Result<&[Class], AppError> {
        if self.classes.is_none() {
            let loaded = db::list_classes(&self.pool, &self.owner).await?;
            if self.selected.is_none() {
                self.selected = loaded.first().map(|c| c.id);
            }
            self.classes = Some(loaded);
        }
        Ok(self.classes.as_deref().unwrap_or_default())
    }

    pub async fn create_class(&mut self, name: &str) -> Result<Class, AppError> {
        let name = validate_class_name(name, self.classes().await?, None)?;
        let class = db::create_class(&self.pool, &self.owner, &name).await?;
        if let Some(list) = self.classes.as_mut() {
            list.insert(0, class.clone());
        }
        self.select_class(Some(class.id));
        Ok(class)
    }

    pub async fn rename_class(&mut self, class_id: i64, name: &str) -> Result<(), AppError> {
        let name = validate_class_name(name, self.classes().await?, Some(class_id))?;
        if !db::update_class(&self.pool, &self.owner, class_id, &name).await? {
            return Err(AppError::NotFound("class"));
        }
        if let Some(class) = self.classes.as_mut().and_then(|l| l.iter_mut().find(|c| c.id == class_id)) {
            class.name = name;
        }
        Ok(())
    }

    /// Deleting the selected class moves the selection to the first remaining one.
    pub async fn delete_class(&mut self, class_id: i64) -> Result<(), AppError> {
        if !db::delete_class(&self.pool, &self.owner, class_id).await? {
            return Err(AppError::NotFound("class"));
        }
        if let Some(list) = self.classes.as_mut() {
            list.retain(|c| c.id != class_id);
        }
        self.notes.invalidate(class_id);
        self.topics.invalidate(class_id);
        self.flashcards.invalidate(class_id);
        self.quizzes.invalidate(class_id);

        // an unloaded list is read from the store, which no longer has the class
        if self.selected == Some(class_id) {
            let next = self.classes().await?.first().map(|c| c.id);
            self.select_class(next);
        }
        Ok(())
    }

    // --- Notes ---

    pub async fn notes(&mut self, class_id: i64) -> Result<&[Note], AppError> {
        if !self.notes.is_loaded(class_id) {
            let loaded = db::list_notes(&self.pool, &self.owner, class_id).await?;
            self.notes.fill(class_id, loaded);
        }
        Ok(self.notes.get(class_id).unwrap_or_default())
    }

    pub async fn add_note(&mut self, class_id: i64, content: &str) -> Result<Note, AppError> {
        let content = require_text("content", content)?;
        let note = db::create_note(&self.pool, &self.owner, class_id, &content, NoteSource::Manual).await?;
        self.notes.prepend(class_id, vec![note.clone()]);
        Ok(note)
    }

    pub async fn edit_note(&mut self, class_id: i64, note_id: i64, content: &str) -> Result<(), AppError> {
        let content = require_text("content", content)?;
        if !db::update_note(&self.pool, &self.owner, note_id, &content).await? {
            return Err(AppError::NotFound("note"));
        }
        self.notes.modify(class_id, note_id, |n| n.content = content);
        Ok(())
    }

    pub async fn delete_note(&mut self, class_id: i64, note_id: i64) -> Result<(), AppError> {
        if !db::delete_note(&self.pool, &self.owner, note_id).await? {
            return Err(AppError::NotFound("note"));
        }
        self.notes.remove(class_id, note_id);
        Ok(())
    }

    pub async fn transcribe(&mut self, class_id: i64, audio: &AudioUpload, language: Language) -> Result<Note, AppError> {
        let note =
            generation::transcribe_to_note(&self.pool, self.backend.as_ref(), &self.owner, class_id, audio, language)
                .await?;
        self.notes.prepend(class_id, vec![note.clone()]);
        Ok(note)
    }

    // --- Topics ---

    pub async fn topics(&mut self, class_id: i64) -> Result<&[Topic], AppError> {
        if !self.topics.is_loaded(class_id) {
            let loaded = db::list_topics(&self.pool, &self.owner, class_id).await?;
            self.topics.fill(class_id, loaded);
        }
        Ok(self.topics.get(class_id).unwrap_or_default())
    }

    pub async fn add_topic(&mut self, class_id: i64, name: &str) -> Result<Topic, AppError> {
        let name = require_text("topic name", name)?;
        let topic = db::create_topic(&self.pool, &self.owner, class_id, &name).await?;
        self.topics.prepend(class_id, vec![topic.clone()]);
        Ok(topic)
    }

    pub async fn rename_topic(&mut self, class_id: i64, topic_id: i64, name: &str) -> Result<(), AppError> {
        let name = require_text("topic name", name)?;
        if !db::update_topic(&self.pool, &self.owner, topic_id, &name).await? {
            return Err(AppError::NotFound("topic"));
        }
        self.topics.modify(class_id, topic_id, |t| t.name = name);
        Ok(())
    }

    pub async fn delete_topic(&mut self, class_id: i64, topic_id: i64) -> Result<(), AppError> {
        if !db::delete_topic(&self.pool, &self.owner, topic_id).await? {
            return Err(AppError::NotFound("topic"));
        }
        self.topics.remove(class_id, topic_id);
        Ok(())
    }

    // --- Flashcards ---

    pub async fn flashcards(&mut self, class_id: i64) -> Result<&[Flashcard], AppError> {
        if !self.flashcards.is_loaded(class_id) {
            let loaded = db::list_flashcards(&self.pool, &self.owner, class_id, None).await?;
            self.flashcards.fill(class_id, loaded);
        }
        Ok(self.flashcards.get(class_id).unwrap_or_default())
    }

    pub async fn generate_flashcards(
        &mut self,
        class_id: i64,
        topics: &[String],
        language: Language,
    ) -> Result<Vec<Flashcard>, AppError> {
        let created =
            generation::generate_flashcards(&self.pool, self.backend.as_ref(), &self.owner, class_id, topics, language)
                .await?;
        self.flashcards.prepend(class_id, created.clone());
        Ok(created)
    }

    /// Applies the given fields to the stored card and its cached copy.
    pub async fn edit_flashcard(
        &mut self,
        class_id: i64,
        flashcard_id: i64,
        fields: UpdateFlashcardPayload,
    ) -> Result<(), AppError> {
        let fields = fields.normalized()?;
        if !db::update_flashcard(&self.pool, &self.owner, flashcard_id, &fields).await? {
            return Err(AppError::NotFound("flashcard"));
        }
        self.flashcards.modify(class_id, flashcard_id, |card| {
            if let Some(topic) = fields.topic {
                card.topic = topic;
            }
            if let Some(question) = fields.question {
                card.question = question;
            }
            if let Some(answer) = fields.answer {
                card.answer = answer;
            }
        });
        Ok(())
    }

    pub async fn delete_flashcard(&mut self, class_id: i64, flashcard_id: i64) -> Result<(), AppError> {
        if !db::delete_flashcard(&self.pool, &self.owner, flashcard_id).await? {
            return Err(AppError::NotFound("flashcard"));
        }
        self.flashcards.remove(class_id, flashcard_id);
        Ok(())
    }

    pub async fn delete_topic_group(&mut self, class_id: i64, topic: &str) -> Result<u64, AppError> {
        let removed = db::delete_flashcards_by_topic(&self.pool, &self.owner, class_id, topic).await?;
        self.flashcards.retain(class_id, |c| c.topic != topic);
        Ok(removed)
    }

    // --- Quizzes ---

    pub async fn quizzes(&mut self, class_id: i64) -> Result<&[Quiz], AppError> {
        if !self.quizzes.is_loaded(class_id) {
            let loaded = db::list_quizzes(&self.pool, &self.owner, class_id).await?;
            self.quizzes.fill(class_id, loaded);
        }
        Ok(self.quizzes.get(class_id).unwrap_or_default())
    }

    pub async fn generate_quiz(
        &mut self,
        class_id: i64,
        source: QuizSource,
        topics: &[String],
        language: Language,
    ) -> Result<Quiz, AppError> {
        let quiz = generation::generate_quiz(
            &self.pool,
            self.backend.as_ref(),
            &self.owner,
            class_id,
            source,
            topics,
            language,
        )
        .await?;
        self.quizzes.prepend(class_id, vec![quiz.clone()]);
        Ok(quiz)
    }

    pub async fn delete_quiz(&mut self, class_id: i64, quiz_id: i64) -> Result<(), AppError> {
        if !db::delete_quiz(&self.pool, &self.owner, quiz_id).await? {
            return Err(AppError::NotFound("quiz"));
        }
        self.quizzes.remove(class_id, quiz_id);
        self.quiz.forget_quiz(quiz_id);
        Ok(())
    }

    /// Starts answering a cached quiz of `class_id`.
    pub async fn start_quiz(&mut self, class_id: i64, quiz_id: i64) -> Result<(), AppError> {
        let quiz = self
            .quizzes(class_id)
            .await?
            .iter()
            .find(|q| q.id == quiz_id)
            .cloned()
            .ok_or(AppError::NotFound("quiz"))?;
        self.quiz.start(quiz);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn topic(id: i64) -> Topic {
        Topic {
            id,
            class_id: 1,
            name: format!("t{}", id),
            created_at: Utc::now(),
        }
    }

    fn ids(cache: &CollectionCache<Topic>) -> Vec<i64> {
        cache.get(1).unwrap().iter().map(|t| t.id).collect()
    }

    #[test]
    fn prepend_keeps_batch_order_in_front() {
        let mut cache = CollectionCache::default();
        cache.fill(1, vec![topic(2), topic(1)]);
        cache.prepend(1, vec![topic(3), topic(4)]);
        assert_eq!(ids(&cache), vec![3, 4, 2, 1]);
    }

    #[test]
    fn unloaded_parents_ignore_merges() {
        let mut cache: CollectionCache<Topic> = CollectionCache::default();
        cache.prepend(1, vec![topic(1)]);
        assert!(!cache.is_loaded(1));
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn remove_modify_and_invalidate() {
        let mut cache = CollectionCache::default();
        cache.fill(1, vec![topic(3), topic(2), topic(1)]);
        cache.remove(1, 2);
        assert_eq!(ids(&cache), vec![3, 1]);
        cache.modify(1, 3, |t| t.name = "renamed".to_string());
        assert_eq!(cache.get(1).unwrap()[0].name, "renamed");
        cache.invalidate(1);
        assert!(!cache.is_loaded(1));
    }
}
