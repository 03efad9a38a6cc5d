#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use blog_auth::configuration::JwtSettings;
use blog_auth::startup::run;
use blog_auth::store::{CredentialStore, InMemoryCredentialStore};
use blog_auth::telemetry::init_test_telemetry;
use serde_json::{json, Value};

pub struct TestApp {
    pub address: String,
    pub store: Arc<dyn CredentialStore>,
    pub jwt: JwtSettings,
    pub client: reqwest::Client,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "integration-access-secret-0123456789".to_string(),
        refresh_secret: "integration-refresh-secret-0123456789".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
        issuer: "blog-admin-test".to_string(),
    }
}

pub fn spawn_app() -> TestApp {
    init_test_telemetry();

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
    let jwt = jwt_settings();
    let server = run(listener, store.clone(), jwt.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        jwt,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .put(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_with_token(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}{}", self.address, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> reqwest::Response {
        self.post(
            "/auth/signup",
            &json!({
                "name": name,
                "email": email,
                "password": password,
                "confirmPassword": password
            }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post("/auth/refresh", &json!({ "refreshToken": refresh_token }))
            .await
    }

    pub async fn logout(&self, refresh_token: &str) -> reqwest::Response {
        self.post("/auth/logout", &json!({ "refreshToken": refresh_token }))
            .await
    }
}

pub async fn body(response: reqwest::Response) -> Value {
    response.json().await.expect("Failed to parse response")
}

pub fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("missing string field {}", key))
        .to_string()
}
