//! Router tests for batch-mode selection and the snapshot event stream.

mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::{build_test_app, expect_json};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn selection_starts_empty() {
    let app = build_test_app().await;
    let json = expect_json(app.get("/selection").await, StatusCode::OK).await;
    assert_eq!(json, json!({ "batch_mode": false, "ids": [] }));
}

#[tokio::test]
async fn selecting_enters_batch_mode_and_leaving_clears() {
    let app = build_test_app().await;
    let basil = app.plant("Basil").await;
    let a = app.reminder(&basil, app.now + Duration::hours(1)).await;
    let b = app.reminder(&basil, app.now + Duration::days(1)).await;

    app.post_empty(&format!("/selection/{}", a.id)).await;
    let json = expect_json(
        app.post_empty(&format!("/selection/{}", b.id)).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["batch_mode"], true);
    assert_eq!(json["ids"], json!([a.id, b.id]));

    let json = expect_json(
        app.delete(&format!("/selection/{}", a.id)).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["ids"], json!([b.id]));

    let json = expect_json(
        app.put("/selection/mode", json!({ "enabled": false })).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json, json!({ "batch_mode": false, "ids": [] }));
}

#[tokio::test]
async fn selecting_unknown_reminder_is_404() {
    let app = build_test_app().await;
    let response = app
        .post_empty(&format!("/selection/{}", Uuid::new_v4()))
        .await;
    let json = expect_json(response, StatusCode::NOT_FOUND).await;
    assert_eq!(json["error"], "NOT_FOUND");
}

#[tokio::test]
async fn selection_done_completes_and_resets() {
    let app = build_test_app().await;
    let fern = app.plant("Fern").await;
    let a = app.reminder(&fern, app.now - Duration::days(1)).await;
    let b = app.reminder(&fern, app.now + Duration::hours(3)).await;
    let untouched = app.reminder(&fern, app.now + Duration::days(4)).await;

    app.post_empty(&format!("/selection/{}", a.id)).await;
    app.post_empty(&format!("/selection/{}", b.id)).await;

    let json = expect_json(app.post_empty("/selection/done").await, StatusCode::OK).await;
    assert_eq!(json["succeeded"].as_array().unwrap().len(), 2);
    assert_eq!(json["failed"], json!([]));

    let selection = expect_json(app.get("/selection").await, StatusCode::OK).await;
    assert_eq!(selection, json!({ "batch_mode": false, "ids": [] }));

    let active = expect_json(app.get("/reminders").await, StatusCode::OK).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["id"], json!(untouched.id));
}

#[tokio::test]
async fn selection_snooze_moves_every_selected_reminder() {
    let app = build_test_app().await;
    let ivy = app.plant("Ivy").await;
    let a = app.reminder(&ivy, app.now + Duration::hours(1)).await;

    app.put("/selection/mode", json!({ "enabled": true })).await;
    app.post_empty(&format!("/selection/{}", a.id)).await;

    let json = expect_json(
        app.post("/selection/snooze", json!({ "days": 2 })).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["succeeded"][0]["id"], json!(a.id));

    let selection = expect_json(app.get("/selection").await, StatusCode::OK).await;
    assert_eq!(selection["ids"], json!([]));
}

#[tokio::test]
async fn events_stream_is_server_sent() {
    let app = build_test_app().await;
    let response = app.get("/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );
}
