use review_board::{AppConfig, AppState, CredentialManager, InMemoryRepository, create_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let mut state = AppState::new(AppConfig::default(), repo);
    state.credentials = CredentialManager::with_cost(1024, 1, 1);
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn register_and_login(&self, username: &str) -> (String, String) {
        let credentials = json!({ "username": username, "password": "pw-123" });

        let response = self
            .client
            .post(self.url("/register"))
            .json(&credentials)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let login: Value = self
            .client
            .post(self.url("/login"))
            .json(&credentials)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        (
            login["token"].as_str().unwrap().to_string(),
            login["userId"].as_str().unwrap().to_string(),
        )
    }
}

fn review_body(name: &str, category: &str, tags: &[&str]) -> Value {
    json!({
        "name": name,
        "store": "Corner",
        "category": category,
        "menu": "Set",
        "taste": "Good",
        "tags": tags,
        "recommend": "yes"
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/health")).send().await.unwrap();

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/health"))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;

    let doc: Value = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["paths"]["/reviews"].is_object());
    assert!(doc["paths"]["/api/reviews/{id}"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer"].is_object());
}

#[tokio::test]
async fn test_malformed_json_body_is_400_json_error() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/register"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn test_full_review_lifecycle() {
    let app = spawn_app().await;
    let (owner_token, owner_id) = app.register_and_login("owner").await;
    let (other_token, _) = app.register_and_login("other").await;

    // Create
    let response = app
        .client
        .post(app.url("/api/reviews"))
        .bearer_auth(&owner_token)
        .json(&review_body("Tteokbokki", "Korean", &["spicy"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    let id = created["_id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 32);
    assert_eq!(created["authorId"], owner_id.as_str());
    assert_eq!(created["authorName"], "owner");

    // Public listing
    let page: Value = app
        .client
        .get(app.url("/reviews?category=all&tag=spicy"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["currentPage"], 1);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["reviews"][0]["_id"], id.as_str());

    // Get requires a token
    let response = app
        .client
        .get(app.url(&format!("/api/reviews/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let fetched: Value = app
        .client
        .get(app.url(&format!("/api/reviews/{id}")))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["name"], "Tteokbokki");

    // Someone else cannot update or delete
    let response = app
        .client
        .put(app.url(&format!("/api/reviews/{id}")))
        .bearer_auth(&other_token)
        .json(&review_body("Hijacked", "Korean", &["spicy"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = app
        .client
        .delete(app.url(&format!("/api/reviews/{id}")))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // The author can
    let ack: Value = app
        .client
        .put(app.url(&format!("/api/reviews/{id}")))
        .bearer_auth(&owner_token)
        .json(&review_body("Rabokki", "Korean", &["spicy", "noodles"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ack, json!({ "ok": true }));

    let response = app
        .client
        .delete(app.url(&format!("/api/reviews/{id}")))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = app
        .client
        .get(app.url(&format!("/api/reviews/{id}")))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Review not found");
}

#[tokio::test]
async fn test_duplicate_registration_over_http() {
    let app = spawn_app().await;
    app.register_and_login("kevin").await;

    let response = app
        .client
        .post(app.url("/register"))
        .json(&json!({ "username": "kevin", "password": "another" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Username already exists");
}
