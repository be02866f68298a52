//! API integration tests
//!
//! Run against a live server with a seeded SUPERADMIN account:
//! `cargo test --test api_tests -- --ignored`

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

fn base_url() -> String {
    std::env::var("WISMA_TEST_URL").unwrap_or_else(|_| "http://localhost:8080/api/v1".to_string())
}

fn admin_credentials() -> (String, String) {
    (
        std::env::var("WISMA_TEST_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
        std::env::var("WISMA_TEST_ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string()),
    )
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

/// Log in and return the access token
async fn login(client: &Client, username: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["data"]["accessToken"]
        .as_str()
        .expect("No access token in response")
        .to_string()
}

async fn admin_token(client: &Client) -> String {
    let (username, password) = admin_credentials();
    login(client, &username, &password).await
}

/// Register a borrower and return (user_id, access token)
async fn borrower(client: &Client) -> (String, String) {
    let username = unique("borrower");
    let response = client
        .post(format!("{}/auth/register", base_url()))
        .json(&json!({ "name": "Test Borrower", "username": username, "password": "secret" }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    let user_id = body["data"]["user"]["user_id"].as_str().unwrap().to_string();
    let token = login(client, &username, "secret").await;
    (user_id, token)
}

/// Create a category and a product with `units` units, returning the unit ids
async fn product_with_units(client: &Client, admin: &str, units: usize) -> Vec<String> {
    product(client, admin, units).await.1
}

/// Like `product_with_units`, also returning the product id
async fn product(client: &Client, admin: &str, units: usize) -> (String, Vec<String>) {
    let response = client
        .post(format!("{}/category", base_url()))
        .bearer_auth(admin)
        .json(&json!({ "category_name": unique("category") }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let category_id = body["data"]["category_id"].as_str().unwrap().to_string();

    let serials: Vec<Value> = (0..units)
        .map(|_| json!({ "serial_number": unique("SN") }))
        .collect();
    let response = client
        .post(format!("{}/products", base_url()))
        .bearer_auth(admin)
        .json(&json!({
            "product_name": unique("product"),
            "category_id": category_id,
            "units": serials,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["quantity"], units as i64);
    let product_id = body["data"]["product_id"].as_str().unwrap().to_string();

    let response = client
        .get(format!("{}/products/{}/units", base_url(), product_id))
        .bearer_auth(admin)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let unit_ids = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["unit_id"].as_str().unwrap().to_string())
        .collect();
    (product_id, unit_ids)
}

async fn request_loan(client: &Client, token: &str, unit_ids: &[String]) -> String {
    let response = client
        .post(format!("{}/loan", base_url()))
        .bearer_auth(token)
        .json(&json!({ "unit_ids": unit_ids }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "REQUESTED");
    body["data"]["loan_id"].as_str().unwrap().to_string()
}

async fn loan_action(client: &Client, token: &str, loan_id: &str, action: &str) -> (StatusCode, Value) {
    let url = format!("{}/loan/{}/{}", base_url(), loan_id, action);
    let request = if action == "return" {
        client.post(url)
    } else {
        client.patch(url)
    };
    let response = request.bearer_auth(token).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

async fn unit_statuses(client: &Client, token: &str, loan_id: &str) -> Vec<String> {
    let response = client
        .get(format!("{}/loan/{}", base_url(), loan_id))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["status"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_register_duplicate_username() {
    let client = Client::new();
    let username = unique("dup");
    let payload = json!({ "name": "Dup", "username": username, "password": "secret" });

    let first = client
        .post(format!("{}/auth/register", base_url()))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(format!("{}/auth/register", base_url()))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
#[ignore]
async fn test_refresh_token_rotation() {
    let client = Client::new();
    let username = unique("rotate");
    client
        .post(format!("{}/auth/register", base_url()))
        .json(&json!({ "name": "Rotate", "username": username, "password": "secret" }))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "username": username, "password": "secret" }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let rotated = client
        .put(format!("{}/auth/refresh", base_url()))
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(rotated.status(), StatusCode::OK);

    // The old refresh token is spent
    let replay = client
        .put(format!("{}/auth/refresh", base_url()))
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_loan_round_trip() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, borrower) = borrower(&client).await;
    let units = product_with_units(&client, &admin, 2).await;

    let loan_id = request_loan(&client, &borrower, &units).await;
    assert!(unit_statuses(&client, &admin, &loan_id).await.iter().all(|s| s == "RESERVED"));

    // A second active loan is refused
    let response = client
        .post(format!("{}/loan", base_url()))
        .bearer_auth(&borrower)
        .json(&json!({ "unit_ids": [units[0]] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let (status, body) = loan_action(&client, &admin, &loan_id, "approve").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "APPROVED");
    assert!(unit_statuses(&client, &admin, &loan_id).await.iter().all(|s| s == "LOANED"));

    let (status, body) = loan_action(&client, &borrower, &loan_id, "return").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "RETURNED");
    assert!(unit_statuses(&client, &admin, &loan_id).await.iter().all(|s| s == "AVAILABLE"));

    let (status, body) = loan_action(&client, &admin, &loan_id, "returned").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "DONE");

    // Completing twice is a conflict
    let (status, body) = loan_action(&client, &admin, &loan_id, "returned").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "fail");

    let response = client
        .get(format!("{}/loan/history", base_url()))
        .bearer_auth(&borrower)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["loan_id"] == loan_id.as_str()));
}

#[tokio::test]
#[ignore]
async fn test_reserved_unit_cannot_be_double_booked() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, first) = borrower(&client).await;
    let (_, second) = borrower(&client).await;
    let units = product_with_units(&client, &admin, 1).await;

    request_loan(&client, &first, &units).await;

    let response = client
        .post(format!("{}/loan", base_url()))
        .bearer_auth(&second)
        .json(&json!({ "unit_ids": units }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_non_owner_cannot_view_or_return() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, owner) = borrower(&client).await;
    let (_, stranger) = borrower(&client).await;
    let units = product_with_units(&client, &admin, 1).await;

    let loan_id = request_loan(&client, &owner, &units).await;
    loan_action(&client, &admin, &loan_id, "approve").await;

    let response = client
        .get(format!("{}/loan/{}", base_url(), loan_id))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, _) = loan_action(&client, &stranger, &loan_id, "return").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_rejected_loan_cannot_be_approved() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, borrower) = borrower(&client).await;
    let units = product_with_units(&client, &admin, 1).await;

    let loan_id = request_loan(&client, &borrower, &units).await;

    let (status, _) = loan_action(&client, &admin, &loan_id, "reject").await;
    assert_eq!(status, StatusCode::OK);
    assert!(unit_statuses(&client, &admin, &loan_id).await.iter().all(|s| s == "AVAILABLE"));

    let (status, body) = loan_action(&client, &admin, &loan_id, "approve").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Cannot approve a loan with status REJECTED");
}

#[tokio::test]
#[ignore]
async fn test_concurrent_approve_and_reject() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, borrower) = borrower(&client).await;
    let units = product_with_units(&client, &admin, 1).await;

    let loan_id = request_loan(&client, &borrower, &units).await;

    let (approve, reject) = tokio::join!(
        loan_action(&client, &admin, &loan_id, "approve"),
        loan_action(&client, &admin, &loan_id, "reject"),
    );

    let mut statuses = [approve.0, reject.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let expected = if approve.0 == StatusCode::OK { "LOANED" } else { "AVAILABLE" };
    assert!(unit_statuses(&client, &admin, &loan_id).await.iter().all(|s| s == expected));
}

#[tokio::test]
#[ignore]
async fn test_concurrent_approvals_succeed_once() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, borrower) = borrower(&client).await;
    let units = product_with_units(&client, &admin, 1).await;

    let loan_id = request_loan(&client, &borrower, &units).await;

    let (first, second, third) = tokio::join!(
        loan_action(&client, &admin, &loan_id, "approve"),
        loan_action(&client, &admin, &loan_id, "approve"),
        loan_action(&client, &admin, &loan_id, "approve"),
    );

    let statuses = [first.0, second.0, third.0];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 2);
}

#[tokio::test]
#[ignore]
async fn test_refresh_after_logout_is_rejected() {
    let client = Client::new();
    let username = unique("logout");
    client
        .post(format!("{}/auth/register", base_url()))
        .json(&json!({ "name": "Logout", "username": username, "password": "secret" }))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "username": username, "password": "secret" }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let logout = client
        .delete(format!("{}/auth/logout", base_url()))
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);

    let response = client
        .put(format!("{}/auth/refresh", base_url()))
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
#[ignore]
async fn test_missing_loan_is_forbidden_for_borrowers() {
    let client = Client::new();
    let (_, borrower) = borrower(&client).await;

    let response = client
        .get(format!("{}/loan/{}", base_url(), Uuid::new_v4()))
        .bearer_auth(&borrower)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_admin_cannot_edit_superadmin() {
    let client = Client::new();
    let superadmin = admin_token(&client).await;

    let response = client
        .get(format!("{}/auth/me", base_url()))
        .bearer_auth(&superadmin)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let superadmin_id = body["data"]["user_id"].as_str().unwrap().to_string();

    let username = unique("admin");
    let response = client
        .post(format!("{}/users", base_url()))
        .bearer_auth(&superadmin)
        .json(&json!({ "name": "Admin", "username": username, "password": "secret", "role": "ADMIN" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let admin = login(&client, &username, "secret").await;

    let response = client
        .patch(format!("{}/users/{}", base_url(), superadmin_id))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Taken over" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_admin_edits_items_of_requested_loan() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, first) = borrower(&client).await;
    let (_, second) = borrower(&client).await;
    let old_units = product_with_units(&client, &admin, 1).await;
    let (product_id, _) = product(&client, &admin, 2).await;

    let loan_id = request_loan(&client, &first, &old_units).await;

    let response = client
        .put(format!("{}/loan/{}/items", base_url(), loan_id))
        .bearer_auth(&admin)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": 2 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "REQUESTED");
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert!(unit_statuses(&client, &admin, &loan_id).await.iter().all(|s| s == "RESERVED"));

    // The released unit can be booked again
    request_loan(&client, &second, &old_units).await;

    // Not enough units left: nothing changes
    let response = client
        .put(format!("{}/loan/{}/items", base_url(), loan_id))
        .bearer_auth(&admin)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": 3 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(unit_statuses(&client, &admin, &loan_id).await.len(), 2);

    loan_action(&client, &admin, &loan_id, "approve").await;
    let response = client
        .put(format!("{}/loan/{}/items", base_url(), loan_id))
        .bearer_auth(&admin)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": 1 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Cannot edit items of a loan with status APPROVED");
}
