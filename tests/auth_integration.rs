use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use tokengate::auth::AuthService;
use tokengate::configuration::AuthSettings;
use tokengate::startup::run;
use tokengate::store::InMemoryStore;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

fn auth_settings() -> AuthSettings {
    AuthSettings {
        jwt_secret: "integration-secret-key-at-least-32-chars".to_string(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_hours: 720,
        password_hash_cost: 4,
    }
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryStore::new());
    let auth_service =
        AuthService::new(&auth_settings(), store.clone(), store).expect("Invalid auth settings");
    let server = run(listener, auth_service).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/register", &json!({"email": email, "password": password}))
            .await
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({"email": email, "password": password}))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/refresh", &json!({"refresh_token": refresh_token}))
            .await
    }

    async fn logout(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/logout", &json!({"refresh_token": refresh_token}))
            .await
    }

    async fn me(&self, authorization: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/api/me", &self.address));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Register and log in, returning the login response body
    async fn logged_in(&self, email: &str, password: &str) -> Value {
        assert_eq!(201, self.register(email, password).await.status().as_u16());
        let response = self.login(email, password).await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }
}

fn token(body: &Value, field: &str) -> String {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing {}", field))
        .to_string()
}

async fn assert_unauthorized(response: reqwest::Response) {
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["message"], "Unauthorized");
}

// --- Full lifecycle ---

#[tokio::test]
async fn full_session_lifecycle() {
    let app = spawn_app().await;

    // Register: 201 with id and email, no password field
    let response = app.register("user@example.com", "pass1234").await;
    assert_eq!(201, response.status().as_u16());
    let user: Value = response.json().await.unwrap();
    assert!(user["id"].is_string());
    assert_eq!(user["email"], "user@example.com");
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    // Login: 200 with both tokens
    let response = app.login("user@example.com", "pass1234").await;
    assert_eq!(200, response.status().as_u16());
    let login: Value = response.json().await.unwrap();
    assert_eq!(login["token_type"], "Bearer");
    assert_eq!(login["expires_in"], 900);
    let original_refresh = token(&login, "refresh_token");

    // Refresh: a different refresh token
    let response = app.refresh(&original_refresh).await;
    assert_eq!(200, response.status().as_u16());
    let refreshed: Value = response.json().await.unwrap();
    let newest_refresh = token(&refreshed, "refresh_token");
    assert_ne!(newest_refresh, original_refresh);

    // Reusing the original is rejected
    assert_unauthorized(app.refresh(&original_refresh).await).await;

    // Logout with the newest token, then again
    assert_eq!(204, app.logout(&newest_refresh).await.status().as_u16());
    assert_eq!(404, app.logout(&newest_refresh).await.status().as_u16());

    // The revoked token no longer refreshes
    assert_unauthorized(app.refresh(&newest_refresh).await).await;
}

// --- Registration ---

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app().await;

    assert_eq!(201, app.register("john@example.com", "pass1234").await.status().as_u16());

    let response = app.register("john@example.com", "different1").await;
    assert_eq!(409, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn register_returns_400_for_invalid_input() {
    let app = spawn_app().await;

    let test_cases = vec![
        (json!({"email": "notanemail", "password": "pass1234"}), "invalid email"),
        (json!({"email": "user@example.com", "password": ""}), "empty password"),
        (json!({"email": "user@example.com", "password": "1234"}), "short password"),
        (json!({"email": "user@example.com"}), "missing password"),
        (json!({"password": "pass1234"}), "missing email"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in test_cases {
        let response = app.post_json("/auth/register", &body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject: {}", reason);
    }
}

// --- Login ---

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app().await;
    assert_eq!(201, app.register("user@example.com", "pass1234").await.status().as_u16());

    assert_unauthorized(app.login("user@example.com", "wrongpass").await).await;
    assert_unauthorized(app.login("nobody@example.com", "pass1234").await).await;
}

#[tokio::test]
async fn login_returns_400_for_empty_password() {
    let app = spawn_app().await;

    let response = app.login("user@example.com", "").await;
    assert_eq!(400, response.status().as_u16());
}

// --- Refresh ---

#[tokio::test]
async fn refresh_rejects_unknown_token() {
    let app = spawn_app().await;

    assert_unauthorized(app.refresh("0123456789abcdef").await).await;
}

#[tokio::test]
async fn refreshed_access_token_authenticates() {
    let app = spawn_app().await;
    let login = app.logged_in("user@example.com", "pass1234").await;

    let response = app.refresh(&token(&login, "refresh_token")).await;
    let refreshed: Value = response.json().await.unwrap();

    let header = format!("Bearer {}", token(&refreshed, "access_token"));
    let response = app.me(Some(&header)).await;
    assert_eq!(200, response.status().as_u16());
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["email"], "user@example.com");
}

#[tokio::test]
async fn concurrent_refresh_succeeds_once() {
    let app = spawn_app().await;
    let login = app.logged_in("user@example.com", "pass1234").await;
    let refresh_token = token(&login, "refresh_token");

    let (first, second) = tokio::join!(app.refresh(&refresh_token), app.refresh(&refresh_token));
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();

    assert_eq!(statuses, vec![200, 401]);
}

// --- Logout ---

#[tokio::test]
async fn logout_unknown_token_returns_404() {
    let app = spawn_app().await;

    let response = app.logout("never-issued").await;
    assert_eq!(404, response.status().as_u16());
}

// --- Authentication gate ---

#[tokio::test]
async fn me_returns_user_for_valid_token() {
    let app = spawn_app().await;
    let login = app.logged_in("user@example.com", "pass1234").await;

    let header = format!("Bearer {}", token(&login, "access_token"));
    let response = app.me(Some(&header)).await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "user@example.com");
    assert!(body["id"].is_string());
}

#[tokio::test]
async fn me_rejects_missing_or_malformed_authorization() {
    let app = spawn_app().await;
    let login = app.logged_in("user@example.com", "pass1234").await;
    let access_token = token(&login, "access_token");

    let tampered = format!("Bearer {}x", access_token);
    let wrong_scheme = format!("Token {}", access_token);
    let cases = vec![
        None,
        Some("Bearer"),
        Some("Bearer not.a.jwt"),
        Some(wrong_scheme.as_str()),
        Some(tampered.as_str()),
    ];

    for case in cases {
        let response = app.me(case).await;
        assert_eq!(
            response.headers().get("www-authenticate").map(|v| v.to_str().unwrap()),
            Some("Bearer")
        );
        assert_unauthorized(response).await;
    }
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = spawn_app().await;
    let login = app.logged_in("user@example.com", "pass1234").await;

    let header = format!("Bearer {}", token(&login, "refresh_token"));
    assert_unauthorized(app.me(Some(&header)).await).await;
}
