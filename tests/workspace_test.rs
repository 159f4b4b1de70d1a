mod common;

use std::sync::Arc;

use study_deck::auth::Principal;
use study_deck::error::AppError;
use study_deck::models::{Language, QuizSource, UpdateFlashcardPayload};
use study_deck::quiz_runtime::QuizRuntime;
use study_deck::workspace::Workspace;

use common::{five_question_reply, setup_pool, StubBackend, USER};

async fn workspace() -> (Workspace, Arc<StubBackend>) {
    let pool = setup_pool().await;
    let backend = StubBackend::new();
    (Workspace::new(pool, backend.clone(), Principal::new(USER)), backend)
}

#[tokio::test]
async fn test_new_class_is_first_and_selected() {
    let (mut ws, _) = workspace().await;
    assert!(ws.classes().await.unwrap().is_empty());
    assert_eq!(ws.selected_class(), None);

    let bio = ws.create_class("Biology").await.unwrap();
    let chem = ws.create_class("Chemistry").await.unwrap();

    let names: Vec<&str> = ws.classes().await.unwrap().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Chemistry", "Biology"]);
    assert_eq!(ws.selected_class(), Some(chem.id));

    let err = ws.create_class(" biology").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    ws.rename_class(bio.id, "Cell Biology").await.unwrap();
    assert_eq!(ws.classes().await.unwrap()[1].name, "Cell Biology");
}

#[tokio::test]
async fn test_deleting_selected_class_reselects() {
    let (mut ws, _) = workspace().await;
    let a = ws.create_class("A").await.unwrap();
    let b = ws.create_class("B").await.unwrap();
    let c = ws.create_class("C").await.unwrap();

    ws.select_class(Some(b.id));
    ws.delete_class(a.id).await.unwrap();
    assert_eq!(ws.selected_class(), Some(b.id), "deleting another class keeps the selection");

    ws.delete_class(b.id).await.unwrap();
    assert_eq!(ws.selected_class(), Some(c.id));

    ws.delete_class(c.id).await.unwrap();
    assert_eq!(ws.selected_class(), None);

    let err = ws.delete_class(c.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("class")));
}

#[tokio::test]
async fn test_cached_collections_merge_writes() {
    let (mut ws, backend) = workspace().await;
    let class = ws.create_class("Biology").await.unwrap();

    assert!(ws.notes(class.id).await.unwrap().is_empty());
    let first = ws.add_note(class.id, "Cells are small").await.unwrap();
    ws.add_note(class.id, "Genes live in DNA").await.unwrap();
    ws.edit_note(class.id, first.id, "Cells are very small").await.unwrap();

    let notes = ws.notes(class.id).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].content, "Genes live in DNA");
    assert_eq!(notes[1].content, "Cells are very small");

    backend.reply_with(
        r#"{"flashcards":[
            {"topic":"Cells","question":"Size of a cell?","answer":"Small"},
            {"topic":"Genetics","question":"Where are genes?","answer":"In DNA"}
        ]}"#,
    );
    assert!(ws.flashcards(class.id).await.unwrap().is_empty());
    let created = ws.generate_flashcards(class.id, &[], Language::En).await.unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(ws.flashcards(class.id).await.unwrap().len(), 2);

    assert_eq!(ws.delete_topic_group(class.id, "Cells").await.unwrap(), 1);
    let cards = ws.flashcards(class.id).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].topic, "Genetics");
}

#[tokio::test]
async fn test_quiz_attempt_through_workspace() {
    let (mut ws, backend) = workspace().await;
    backend.reply_with(&five_question_reply());
    let class = ws.create_class("Biology").await.unwrap();
    ws.add_note(class.id, "Cells and genes").await.unwrap();

    let quiz = ws.generate_quiz(class.id, QuizSource::Notes, &[], Language::En).await.unwrap();
    ws.start_quiz(class.id, quiz.id).await.unwrap();

    for (question, choice) in [0, 1, 2, 3].into_iter().enumerate() {
        ws.quiz.answer(question, choice).unwrap();
    }
    assert_eq!(ws.quiz.unanswered(), 1);
    assert!(ws.quiz.submit().is_err());

    ws.quiz.answer(4, 0).unwrap();
    let result = ws.quiz.submit().unwrap();
    assert_eq!(result.score, 80);
    assert!(matches!(ws.quiz, QuizRuntime::Graded { .. }));

    // deleting the graded quiz drops the attempt
    ws.delete_quiz(class.id, quiz.id).await.unwrap();
    assert_eq!(ws.quiz, QuizRuntime::Browsing);
    assert!(ws.quizzes(class.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_selected_class_before_listing() {
    let pool = setup_pool().await;
    let backend = StubBackend::new();
    let mut first = Workspace::new(pool.clone(), backend.clone(), Principal::new(USER));
    let a = first.create_class("A").await.unwrap();
    let b = first.create_class("B").await.unwrap();

    // a fresh view that never listed its classes
    let mut fresh = Workspace::new(pool, backend, Principal::new(USER));
    fresh.select_class(Some(b.id));
    fresh.delete_class(b.id).await.unwrap();
    assert_eq!(fresh.selected_class(), Some(a.id));

    let ids: Vec<i64> = fresh.classes().await.unwrap().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![a.id]);
}

#[tokio::test]
async fn test_topic_edits_update_the_cache() {
    let (mut ws, _) = workspace().await;
    let class = ws.create_class("Biology").await.unwrap();

    assert!(ws.topics(class.id).await.unwrap().is_empty());
    let cells = ws.add_topic(class.id, "Cells").await.unwrap();
    let genetics = ws.add_topic(class.id, "Genetics").await.unwrap();
    ws.rename_topic(class.id, cells.id, " Cell Biology ").await.unwrap();
    ws.delete_topic(class.id, genetics.id).await.unwrap();

    let topics = ws.topics(class.id).await.unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].name, "Cell Biology");
    assert!(matches!(
        ws.delete_topic(class.id, genetics.id).await.unwrap_err(),
        AppError::NotFound("topic")
    ));

    let edit = UpdateFlashcardPayload {
        answer: Some("  Very small ".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        ws.edit_flashcard(class.id, 999, edit).await.unwrap_err(),
        AppError::NotFound("flashcard")
    ));
}

#[tokio::test]
async fn test_edit_generated_flashcard() {
    let (mut ws, backend) = workspace().await;
    backend.reply_with(r#"{"flashcards":[{"topic":"Cells","question":"Size of a cell?","answer":"Small"}]}"#);
    let class = ws.create_class("Biology").await.unwrap();
    ws.add_note(class.id, "Cells are small").await.unwrap();
    assert!(ws.flashcards(class.id).await.unwrap().is_empty());
    let created = ws.generate_flashcards(class.id, &[], Language::En).await.unwrap();

    let edit = UpdateFlashcardPayload {
        topic: Some("Cell Biology".to_string()),
        answer: Some("  Very small ".to_string()),
        ..Default::default()
    };
    ws.edit_flashcard(class.id, created[0].id, edit).await.unwrap();

    let card = &ws.flashcards(class.id).await.unwrap()[0];
    assert_eq!(card.topic, "Cell Biology");
    assert_eq!(card.question, "Size of a cell?");
    assert_eq!(card.answer, "Very small");

    let blank = UpdateFlashcardPayload {
        question: Some("   ".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        ws.edit_flashcard(class.id, created[0].id, blank).await.unwrap_err(),
        AppError::Validation(_)
    ));
}

#[tokio::test]
async fn test_restarting_a_quiz_clears_answers() {
    let (mut ws, backend) = workspace().await;
    backend.reply_with(&five_question_reply());
    let class = ws.create_class("Biology").await.unwrap();
    ws.add_note(class.id, "Cells and genes").await.unwrap();
    let quiz = ws.generate_quiz(class.id, QuizSource::Notes, &[], Language::En).await.unwrap();

    ws.start_quiz(class.id, quiz.id).await.unwrap();
    ws.quiz.answer(0, 1).unwrap();
    ws.quiz.answer(1, 1).unwrap();
    assert_eq!(ws.quiz.unanswered(), 3);

    ws.start_quiz(class.id, quiz.id).await.unwrap();
    assert_eq!(ws.quiz.unanswered(), 5);
}
