//! Integration tests for the tokengate server

use std::net::TcpListener;
use std::sync::Arc;
use tokengate::auth::AuthService;
use tokengate::configuration::AuthSettings;
use tokengate::startup::run;
use tokengate::store::InMemoryStore;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = AuthSettings {
        jwt_secret: "health-check-secret-key-of-some-length".to_string(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_hours: 720,
        password_hash_cost: 4,
    };
    let store = Arc::new(InMemoryStore::new());
    let auth_service = AuthService::new(&settings, store.clone(), store).expect("Invalid settings");
    let server = run(listener, auth_service).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
