//! Integration tests for the service's public surface

mod common;

use common::spawn_app;

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app();

    let response = app
        .client
        .get(&format!("{}/health_check", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = spawn_app();

    let response = app
        .client
        .get(&format!("{}/nope", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn malformed_json_is_rejected_with_400() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/auth/login", app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(400, response.status().as_u16());
}
