use reqwest::StatusCode;
use roster_api::routes::ValidationErrorResponse;
use roster_api::routes::notifications::{
    MarkNotificationsReadResponse, ReadNotificationsResponse,
};
use roster_telemetry::tracing::init_test_tracing;
use serde_json::json;

use crate::support::test_app::{TestApp, spawn_test_app};

mod support {
    pub(crate) mod test_app;
}

async fn queue_one_staff(app: &TestApp, name: &str) {
    let response = app
        .add_staff(&json!([
            { "name": name, "position": "Engineer", "age": 30, "salary": 1000.0 }
        ]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

async fn read_notifications(app: &TestApp, query: &str) -> ReadNotificationsResponse {
    let response = app.read_notifications(query).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("failed to deserialize body")
}

async fn mark_read(app: &TestApp, ids: Option<&serde_json::Value>) -> u64 {
    let response = app.mark_notifications_read(ids).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: MarkNotificationsReadResponse =
        response.json().await.expect("failed to deserialize body");
    assert_eq!(body.message, "Notifications marked as read.");
    body.data.modified
}

#[tokio::test(flavor = "multi_thread")]
async fn accepted_mutations_create_notifications() {
    init_test_tracing();
    let app = spawn_test_app().await;

    queue_one_staff(&app, "Ada").await;
    app.add_staff_csv(roster::test_utils::io::staff_csv(3)).await;

    let body = read_notifications(&app, "").await;
    assert_eq!(body.message, "Notifications fetched successfully.");
    let titles: Vec<_> = body.data.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["CSV import", "Staff queued"]);
    assert_eq!(body.data[0].message, "Importing 3 CSV rows.");
    assert_eq!(body.data[1].message, "Queued 1 staff records for insertion.");
    assert!(body.data.iter().all(|n| !n.read));
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_honors_the_limit() {
    init_test_tracing();
    let app = spawn_test_app().await;
    for name in ["Ada", "Grace", "Alan"] {
        queue_one_staff(&app, name).await;
    }

    let body = read_notifications(&app, "?limit=2").await;

    assert_eq!(body.data.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_range_limit_is_rejected() {
    init_test_tracing();
    let app = spawn_test_app().await;

    let response = app.read_notifications("?limit=0").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ValidationErrorResponse = response.json().await.expect("failed to deserialize body");
    assert_eq!(body.message, "limit must be between 1 and 500");
}

#[tokio::test(flavor = "multi_thread")]
async fn marking_without_ids_marks_everything_once() {
    init_test_tracing();
    let app = spawn_test_app().await;
    for name in ["Ada", "Grace", "Alan", "Barbara", "Edsger"] {
        queue_one_staff(&app, name).await;
    }

    assert_eq!(mark_read(&app, None).await, 5);
    assert_eq!(mark_read(&app, None).await, 0);

    let body = read_notifications(&app, "").await;
    assert!(body.data.iter().all(|n| n.read));
}

#[tokio::test(flavor = "multi_thread")]
async fn marking_by_id_only_touches_those_notifications() {
    init_test_tracing();
    let app = spawn_test_app().await;
    queue_one_staff(&app, "Ada").await;
    queue_one_staff(&app, "Grace").await;
    let listed = read_notifications(&app, "").await;
    let target = listed.data[1].id.clone();

    assert_eq!(mark_read(&app, Some(&json!([target]))).await, 1);

    let body = read_notifications(&app, "").await;
    let read: Vec<_> = body.data.iter().map(|n| (n.id.as_str(), n.read)).collect();
    assert_eq!(
        read,
        vec![(listed.data[0].id.as_str(), false), (target.as_str(), true)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn marking_with_invalid_ids_is_rejected() {
    init_test_tracing();
    let app = spawn_test_app().await;

    let response = app
        .mark_notifications_read(Some(&json!(["definitely-not-a-uuid"])))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ValidationErrorResponse = response.json().await.expect("failed to deserialize body");
    assert_eq!(body.message, "Notification ID must be a valid UUID");
}
