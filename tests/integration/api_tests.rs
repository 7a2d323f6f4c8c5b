//! API integration tests against a running server

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn unique_email() -> String {
    format!("reader-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// Register a fresh reader and return (email, token)
async fn register_and_login(client: &Client) -> (String, String) {
    let email = unique_email();

    let response = client
        .post(format!("{}/users/register", BASE_URL))
        .json(&json!({
            "email": email,
            "password": "secret1",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/users/login", BASE_URL))
        .json(&json!({ "email": email, "password": "secret1" }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    let token = body["token"].as_str().expect("No token in response").to_string();
    (email, token)
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_register_login_and_me() {
    let client = Client::new();
    let (email, token) = register_and_login(&client).await;

    let response = client
        .get(format!("{}/users/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], email);
    assert_eq!(body["role"], "reader");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
#[ignore]
async fn test_register_duplicate_email() {
    let client = Client::new();
    let (email, _) = register_and_login(&client).await;

    let response = client
        .post(format!("{}/users/register", BASE_URL))
        .json(&json!({
            "email": email.to_uppercase(),
            "password": "secret1",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_register_rejects_bad_names() {
    let client = Client::new();

    let response = client
        .post(format!("{}/users/register", BASE_URL))
        .json(&json!({
            "email": unique_email(),
            "password": "secret1",
            "first_name": "R2D2",
            "last_name": "Lovelace"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/users/login", BASE_URL))
        .json(&json!({ "email": unique_email(), "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_list_books_is_public() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books?per_page=5", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert_eq!(body["per_page"], 5);
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_create_book() {
    let client = Client::new();
    let (_, token) = register_and_login(&client).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "title": "Dune",
            "author": "Frank Herbert",
            "cover": "HARD",
            "inventory": 1,
            "daily_fee": "0.50"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_borrowing_requires_authentication() {
    let client = Client::new();

    let response = client
        .post(format!("{}/borrowings", BASE_URL))
        .json(&json!({ "book_id": 1, "expected_return_date": "2100-01-01" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_borrowing_in_the_past_is_rejected() {
    let client = Client::new();
    let (_, token) = register_and_login(&client).await;

    let response = client
        .post(format!("{}/borrowings", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "book_id": 1, "expected_return_date": "2000-01-01" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "InvalidDateRange");
}
