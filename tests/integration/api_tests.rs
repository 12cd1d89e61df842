//! API integration tests
//!
//! Run against a live server with a migrated database:
//! `cargo test --test api_tests -- --ignored`

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn unique_suffix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos() as u64
}

/// Create a book with the given number of copies, returning its id
async fn create_book(client: &Client, total_copies: i64) -> String {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "title": "Test Book",
            "author": "Test Author",
            "isbn": format!("978{:010}", unique_suffix() % 10_000_000_000),
            "total_copies": total_copies
        }))
        .send()
        .await
        .expect("Failed to send create book request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse book");
    body["id"].as_str().expect("No book ID").to_string()
}

/// Create a member, returning their id
async fn create_member(client: &Client) -> String {
    let response = client
        .post(format!("{}/members", BASE_URL))
        .json(&json!({
            "name": "Test Member",
            "email": format!("member{}@example.org", unique_suffix())
        }))
        .send()
        .await
        .expect("Failed to send create member request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse member");
    body["id"].as_str().expect("No member ID").to_string()
}

/// Grant a loan, returning the raw response
async fn grant_loan(client: &Client, book_id: &str, member_id: &str) -> reqwest::Response {
    client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({ "book_id": book_id, "member_id": member_id }))
        .send()
        .await
        .expect("Failed to send grant request")
}

async fn get_available_copies(client: &Client, book_id: &str) -> i64 {
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send get book request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse book");
    body["available_copies"].as_i64().expect("No copies field")
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
async fn test_create_and_get_book() {
    let client = Client::new();
    let book_id = create_book(&client, 3).await;

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["total_copies"], 3);
    assert_eq!(body["available_copies"], 3);
    assert_eq!(body["version"], 1);
}

#[tokio::test]
#[ignore]
async fn test_grant_and_return_flow() {
    let client = Client::new();
    let book_id = create_book(&client, 5).await;
    let member_id = create_member(&client).await;

    // Grant
    let response = grant_loan(&client, &book_id, &member_id).await;
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    assert_eq!(loan["status"], "granted");
    assert!(loan["returned_at"].is_null());
    let loan_id = loan["id"].as_str().expect("No loan ID").to_string();

    assert_eq!(get_available_copies(&client, &book_id).await, 4);

    // Return
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send return request");
    assert_eq!(response.status(), 200);
    let returned: Value = response.json().await.expect("Failed to parse loan");
    assert_eq!(returned["status"], "returned");
    assert!(returned["returned_at"].is_string());

    assert_eq!(get_available_copies(&client, &book_id).await, 5);

    // Second return must fail and must not touch availability again
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send return request");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "already_returned");

    assert_eq!(get_available_copies(&client, &book_id).await, 5);
}

#[tokio::test]
#[ignore]
async fn test_loan_limit_exceeded() {
    let client = Client::new();
    let member_id = create_member(&client).await;

    for _ in 0..5 {
        let book_id = create_book(&client, 1).await;
        let response = grant_loan(&client, &book_id, &member_id).await;
        assert_eq!(response.status(), 201);
    }

    let sixth_book = create_book(&client, 1).await;
    let response = grant_loan(&client, &sixth_book, &member_id).await;
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "loan_limit_exceeded");

    // The rejected grant must not have consumed a copy
    assert_eq!(get_available_copies(&client, &sixth_book).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_active_loan_rejected() {
    let client = Client::new();
    let book_id = create_book(&client, 5).await;
    let member_id = create_member(&client).await;

    let response = grant_loan(&client, &book_id, &member_id).await;
    assert_eq!(response.status(), 201);

    let response = grant_loan(&client, &book_id, &member_id).await;
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "active_loan_exists");

    assert_eq!(get_available_copies(&client, &book_id).await, 4);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_grants_on_last_copy() {
    let client = Client::new();
    let book_id = create_book(&client, 1).await;
    let member_a = create_member(&client).await;
    let member_b = create_member(&client).await;

    let (resp_a, resp_b) = tokio::join!(
        grant_loan(&client, &book_id, &member_a),
        grant_loan(&client, &book_id, &member_b)
    );

    let statuses = [resp_a.status().as_u16(), resp_b.status().as_u16()];
    let successes = statuses.iter().filter(|s| **s == 201).count();
    let conflicts = statuses.iter().filter(|s| **s == 409).count();

    assert_eq!(successes, 1, "exactly one grant must win, got {:?}", statuses);
    assert_eq!(conflicts, 1, "the loser must get a conflict, got {:?}", statuses);
    assert_eq!(get_available_copies(&client, &book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_grant_for_unknown_member() {
    let client = Client::new();
    let book_id = create_book(&client, 1).await;

    let response = grant_loan(
        &client,
        &book_id,
        "00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "member_not_found");
}

#[tokio::test]
#[ignore]
async fn test_grant_for_unknown_book() {
    let client = Client::new();
    let member_id = create_member(&client).await;

    let response = grant_loan(
        &client,
        "00000000-0000-0000-0000-000000000000",
        &member_id,
    )
    .await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "book_not_found");
}

#[tokio::test]
#[ignore]
async fn test_return_unknown_loan() {
    let client = Client::new();

    let response = client
        .post(format!(
            "{}/loans/00000000-0000-0000-0000-000000000000/return",
            BASE_URL
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_member_loans_listing() {
    let client = Client::new();
    let member_id = create_member(&client).await;
    let book_id = create_book(&client, 1).await;

    let response = grant_loan(&client, &book_id, &member_id).await;
    assert_eq!(response.status(), 201);

    let response = client
        .get(format!("{}/members/{}/loans", BASE_URL, member_id))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["book_id"], book_id.as_str());
}

#[tokio::test]
#[ignore]
async fn test_metrics_endpoint() {
    let client = Client::new();
    let member_id = create_member(&client).await;
    let book_id = create_book(&client, 1).await;

    let response = grant_loan(&client, &book_id, &member_id).await;
    assert_eq!(response.status(), 201);

    let response = client
        .get(format!("{}/metrics", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["grant_success_count"].as_u64().expect("counter") >= 1);
    assert!(body["grant_failure_count"].is_number());
    assert!(body["active_loans_gauge"].as_i64().expect("gauge") >= 1);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_isbn_rejected() {
    let client = Client::new();
    let isbn = format!("978{:010}", unique_suffix() % 10_000_000_000);

    let payload = json!({
        "title": "Test Book",
        "author": "Test Author",
        "isbn": isbn,
        "total_copies": 1
    });

    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&payload)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&payload)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}
