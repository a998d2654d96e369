//! services/api/tests/auth_flow.rs
//!
//! End-to-end signup and token exchange, driven over HTTP against the
//! in-memory application.

mod common;

use axum::http::StatusCode;
use common::test_app;
use critique_core::domain::Role;
use critique_core::ports::DatabaseService;
use serde_json::json;

#[tokio::test]
async fn signup_registers_and_mails_a_confirmation_code() {
    let app = test_app();

    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"username": "alice", "email": "alice@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");

    let sent = app.mail.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert_eq!(sent[0].subject, "Confirmation code");
    assert!(!sent[0].body.is_empty());
}

#[tokio::test]
async fn confirmation_code_exchanges_for_a_working_token() {
    let app = test_app();
    app.post(
        "/v1/auth/signup/",
        None,
        json!({"username": "bob", "email": "bob@example.com"}),
    )
    .await;
    let code = app.mail.sent()[0].body.clone();

    let (status, body) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "bob", "confirmation_code": code}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = app.get("/v1/users/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "bob");
    assert_eq!(me["role"], "user");
}

#[tokio::test]
async fn repeating_signup_reissues_a_fresh_code() {
    let app = test_app();
    let payload = json!({"username": "carol", "email": "carol@example.com"});

    let (status, _) = app.post("/v1/auth/signup/", None, payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post("/v1/auth/signup/", None, payload).await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.mail.sent();
    assert_eq!(sent.len(), 2);
    let first_code = sent[0].body.clone();
    let second_code = sent[1].body.clone();

    // The reissue replaces the stored code, so only the latest one works.
    let (status, body) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "carol", "confirmation_code": first_code}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid confirmation code.");

    let (status, _) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "carol", "confirmation_code": second_code}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn signup_rejects_conflicting_pairs() {
    let app = test_app();
    app.post(
        "/v1/auth/signup/",
        None,
        json!({"username": "dave", "email": "dave@example.com"}),
    )
    .await;

    // Taken username with someone else's email.
    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"username": "dave", "email": "other@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Username 'dave' is already in use");

    // Taken email with a fresh username.
    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"username": "newcomer", "email": "dave@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email 'dave@example.com' is already in use");
}

#[tokio::test]
async fn signup_validates_the_payload() {
    let app = test_app();

    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"username": "me", "email": "me@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "username 'me' is reserved");

    let (status, body) = app
        .post("/v1/auth/signup/", None, json!({"username": "eve"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "email is a required field");

    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"username": "eve", "email": "not-an-address"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "email is not a valid address");

    let (status, body) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"username": "has spaces", "email": "ok@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "username may only contain letters, digits and @/./+/-/_ characters"
    );
}

#[tokio::test]
async fn mail_failure_does_not_undo_the_registration() {
    let app = test_app();
    app.mail.set_failing(true);

    let (status, _) = app
        .post(
            "/v1/auth/signup/",
            None,
            json!({"username": "frank", "email": "frank@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.mail.sent().is_empty());

    // The account exists and its code is stored; only delivery failed.
    let user = app
        .db
        .find_user_by_username("frank")
        .await
        .unwrap()
        .expect("account should exist despite the mail failure");
    let code = user.confirmation_code.expect("code should be stored");

    let (status, _) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "frank", "confirmation_code": code}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn token_endpoint_distinguishes_unknown_user_from_bad_code() {
    let app = test_app();
    app.post(
        "/v1/auth/signup/",
        None,
        json!({"username": "grace", "email": "grace@example.com"}),
    )
    .await;

    // Unknown username is 404, not 400.
    let (status, _) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "nobody", "confirmation_code": "whatever"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Known username with a garbage code is 400.
    let (status, body) = app
        .post(
            "/v1/auth/token/",
            None,
            json!({"username": "grace", "confirmation_code": "garbage"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid confirmation code.");
}

#[tokio::test]
async fn confirmation_codes_are_single_use() {
    let app = test_app();
    app.post(
        "/v1/auth/signup/",
        None,
        json!({"username": "heidi", "email": "heidi@example.com"}),
    )
    .await;
    let code = app.mail.sent()[0].body.clone();
    let exchange = json!({"username": "heidi", "confirmation_code": code});

    let (status, _) = app.post("/v1/auth/token/", None, exchange.clone()).await;
    assert_eq!(status, StatusCode::OK);

    // The code was cleared by the successful exchange; replaying it fails.
    let (status, body) = app.post("/v1/auth/token/", None, exchange).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid confirmation code.");
}

#[tokio::test]
async fn invalid_bearer_tokens_are_rejected() {
    let app = test_app();

    let (status, body) = app.get("/v1/users/me/", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid or expired token.");
}

#[tokio::test]
async fn tokens_of_deleted_accounts_stop_authenticating() {
    let app = test_app();
    let (_, token) = app.seed_with_token("ivan", Role::User).await;

    let (status, _) = app.get("/v1/users/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    app.db.delete_user("ivan").await.unwrap();

    let (status, body) = app.get("/v1/users/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "User no longer exists.");
}
