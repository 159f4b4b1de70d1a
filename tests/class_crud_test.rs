mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{create_class, create_note, request, request_as, setup_app, OTHER_USER, USER};

#[tokio::test]
async fn test_create_class_lists_first() {
    let (app, _) = setup_app().await;

    let first = create_class(&app, "Biology").await;
    let second = create_class(&app, "History").await;

    let (status, body) = request(&app, Method::GET, "/api/classes", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let classes = body.as_array().expect("body should be an array");
    assert_eq!(classes.len(), 2);
    assert_eq!(classes[0]["id"].as_i64(), Some(second), "newest class should come first");
    assert_eq!(classes[1]["id"].as_i64(), Some(first));
    assert_eq!(classes[0]["owner_id"], USER);
}

#[tokio::test]
async fn test_create_class_validation() {
    let (app, _) = setup_app().await;
    create_class(&app, "Biology").await;

    let (status, body) = request(&app, Method::POST, "/api/classes", json!({ "name": "  BIOLOGY " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("already exists"), "got: {}", body);

    let (status, body) = request(&app, Method::POST, "/api/classes", json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("cannot be empty"), "got: {}", body);

    // another user may reuse the name
    let (status, _) = request_as(&app, Some(OTHER_USER), Method::POST, "/api/classes", json!({ "name": "Biology" })).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_rename_class() {
    let (app, _) = setup_app().await;
    let bio = create_class(&app, "Biology").await;
    create_class(&app, "History").await;

    let uri = format!("/api/classes/{}", bio);
    let (status, _) = request(&app, Method::PUT, &uri, json!({ "name": "history" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&app, Method::PUT, &uri, json!({ "name": "Cell Biology" })).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = request(&app, Method::GET, "/api/classes", json!({})).await;
    let renamed = body
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"].as_i64() == Some(bio))
        .expect("renamed class should still be listed");
    assert_eq!(renamed["name"], "Cell Biology");

    let (status, _) = request(&app, Method::PUT, "/api/classes/9999", json!({ "name": "Nope" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_class_cascades() {
    let (app, _) = setup_app().await;
    let class_id = create_class(&app, "Chemistry").await;
    let note_id = create_note(&app, class_id, "Atoms have protons").await;

    let uri = format!("/api/classes/{}", class_id);
    let (status, _) = request(&app, Method::DELETE, &uri, json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // the note went with its class
    let (status, _) = request(&app, Method::DELETE, &format!("/api/notes/{}", note_id), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (repeat_status, _) = request(&app, Method::DELETE, &uri, json!({})).await;
    assert_eq!(repeat_status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requires_principal() {
    let (app, _) = setup_app().await;

    let (status, body) = request_as(&app, None, Method::GET, "/api/classes", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "not authenticated");

    let (status, _) = request_as(&app, None, Method::GET, "/api/health", json!({})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_classes_are_scoped_to_owner() {
    let (app, _) = setup_app().await;
    let class_id = create_class(&app, "Physics").await;
    create_note(&app, class_id, "F = ma").await;

    let (_, body) = request_as(&app, Some(OTHER_USER), Method::GET, "/api/classes", json!({})).await;
    assert!(body.as_array().unwrap().is_empty());

    let notes_uri = format!("/api/classes/{}/notes", class_id);
    let (_, body) = request_as(&app, Some(OTHER_USER), Method::GET, &notes_uri, json!({})).await;
    assert!(body.as_array().unwrap().is_empty(), "other users must not see notes");

    let (status, _) = request_as(&app, Some(OTHER_USER), Method::POST, &notes_uri, json!({ "content": "sneaky" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        request_as(&app, Some(OTHER_USER), Method::DELETE, &format!("/api/classes/{}", class_id), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
