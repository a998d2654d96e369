//! services/api/tests/reviews_comments.rs
//!
//! Reviews and comments over HTTP: one review per author per title, the
//! averaged rating, author/moderator/admin edit rights and the delete
//! cascades.

mod common;

use axum::http::StatusCode;
use common::{test_app, TestApp};
use critique_core::domain::Role;
use serde_json::{json, Value};

/// Creates a title as the admin and returns its id as a path segment.
async fn seed_title(app: &TestApp, admin_token: &str, name: &str) -> String {
    let (status, title) = app
        .post("/v1/titles/", Some(admin_token), json!({"name": name}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    title["id"].as_str().unwrap().to_string()
}

async fn post_review(
    app: &TestApp,
    title_id: &str,
    token: &str,
    text: &str,
    score: i64,
) -> (StatusCode, Value) {
    app.post(
        &format!("/v1/titles/{}/reviews/", title_id),
        Some(token),
        json!({"text": text, "score": score}),
    )
    .await
}

#[tokio::test]
async fn a_review_names_its_title_and_author() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, reader_token) = app.seed_with_token("reader", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    let (status, body) = post_review(&app, &title_id, &reader_token, "Slow but rewarding", 8).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Dune");
    assert_eq!(body["author"], "reader");
    assert_eq!(body["score"], 8);
    assert!(body["pub_date"].is_string());

    // Reads are open to everyone.
    let (status, body) = app
        .get(&format!("/v1/titles/{}/reviews/", title_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn writing_a_review_requires_authentication() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    let (status, body) = app
        .post(
            &format!("/v1/titles/{}/reviews/", title_id),
            None,
            json!({"text": "Anonymous hot take", "score": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Authentication credentials were not provided.");
}

#[tokio::test]
async fn the_rating_is_the_mean_of_the_scores() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, alice_token) = app.seed_with_token("alice", Role::User).await;
    let (_, bob_token) = app.seed_with_token("bob", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;
    let title_path = format!("/v1/titles/{}/", title_id);

    let (_, body) = app.get(&title_path, None).await;
    assert_eq!(body["rating"], Value::Null);

    post_review(&app, &title_id, &alice_token, "Loved it", 8).await;
    post_review(&app, &title_id, &bob_token, "Fine", 5).await;

    let (_, body) = app.get(&title_path, None).await;
    assert_eq!(body["rating"], 6.5);
}

#[tokio::test]
async fn one_review_per_author_per_title() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, reader_token) = app.seed_with_token("reader", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    let (status, _) = post_review(&app, &title_id, &reader_token, "First impression", 7).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_review(&app, &title_id, &reader_token, "Changed my mind", 4).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Only one review per title is allowed");

    // A different title is a fresh slate.
    let other_id = seed_title(&app, &admin_token, "Dune Messiah").await;
    let (status, _) = post_review(&app, &other_id, &reader_token, "Also good", 7).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn review_payloads_are_validated() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, reader_token) = app.seed_with_token("reader", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;
    let path = format!("/v1/titles/{}/reviews/", title_id);

    for score in [0, 11] {
        let (status, body) = post_review(&app, &title_id, &reader_token, "Out of range", score).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "score must be between 1 and 10");
    }

    let (status, body) = app
        .post(&path, Some(&reader_token), json!({"score": 5}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "text is a required field");

    let (status, body) = app
        .post(&path, Some(&reader_token), json!({"text": "No verdict"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "score is a required field");
}

#[tokio::test]
async fn only_the_author_a_moderator_or_an_admin_may_edit() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, author_token) = app.seed_with_token("author", Role::User).await;
    let (_, stranger_token) = app.seed_with_token("stranger", Role::User).await;
    let (_, moderator_token) = app.seed_with_token("mod", Role::Moderator).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    let (_, review) = post_review(&app, &title_id, &author_token, "Original text", 6).await;
    let review_path = format!(
        "/v1/titles/{}/reviews/{}/",
        title_id,
        review["id"].as_str().unwrap()
    );

    let (status, body) = app
        .patch(&review_path, Some(&stranger_token), json!({"score": 1}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["detail"],
        "You do not have permission to perform this action."
    );

    let (status, _) = app.delete(&review_path, Some(&stranger_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&review_path, Some(&author_token), json!({"text": "Revised text"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Revised text");
    assert_eq!(body["score"], 6);

    let (status, body) = app
        .patch(&review_path, Some(&admin_token), json!({"score": 9}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 9);

    let (status, _) = app.delete(&review_path, Some(&moderator_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&review_path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reviews_are_scoped_to_their_title() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, reader_token) = app.seed_with_token("reader", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;
    let other_id = seed_title(&app, &admin_token, "Dune Messiah").await;

    let (_, review) = post_review(&app, &title_id, &reader_token, "Belongs to Dune", 7).await;

    // The right review id under the wrong title is not found.
    let (status, _) = app
        .get(
            &format!(
                "/v1/titles/{}/reviews/{}/",
                other_id,
                review["id"].as_str().unwrap()
            ),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // So is any review route under a title that does not exist.
    let ghost = "00000000-0000-0000-0000-000000000000";
    let (status, _) = app.get(&format!("/v1/titles/{}/reviews/", ghost), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(
            &format!("/v1/titles/{}/reviews/", ghost),
            Some(&reader_token),
            json!({"text": "Into the void", "score": 5}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_thread_under_a_review() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, author_token) = app.seed_with_token("author", Role::User).await;
    let (_, replier_token) = app.seed_with_token("replier", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    let (_, review) = post_review(&app, &title_id, &author_token, "Worth a reread", 9).await;
    let comments_path = format!(
        "/v1/titles/{}/reviews/{}/comments/",
        title_id,
        review["id"].as_str().unwrap()
    );

    let (status, body) = app
        .post(&comments_path, Some(&replier_token), json!({"text": "Agreed"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["review"], "Worth a reread");
    assert_eq!(body["author"], "replier");

    let (status, _) = app.post(&comments_path, None, json!({"text": "Drive-by"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post(&comments_path, Some(&replier_token), json!({"text": ""}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "text must not be empty");

    let (status, body) = app.get(&comments_path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // A review id that does not exist is 404 for both list and create.
    let ghost_path = format!(
        "/v1/titles/{}/reviews/00000000-0000-0000-0000-000000000000/comments/",
        title_id
    );
    let (status, _) = app.get(&ghost_path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_moderation_mirrors_reviews() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, author_token) = app.seed_with_token("author", Role::User).await;
    let (_, stranger_token) = app.seed_with_token("stranger", Role::User).await;
    let (_, moderator_token) = app.seed_with_token("mod", Role::Moderator).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    let (_, review) = post_review(&app, &title_id, &author_token, "Worth a reread", 9).await;
    let review_id = review["id"].as_str().unwrap();
    let (_, comment) = app
        .post(
            &format!("/v1/titles/{}/reviews/{}/comments/", title_id, review_id),
            Some(&author_token),
            json!({"text": "Replying to myself"}),
        )
        .await;
    let comment_path = format!(
        "/v1/titles/{}/reviews/{}/comments/{}/",
        title_id,
        review_id,
        comment["id"].as_str().unwrap()
    );

    let (status, _) = app
        .patch(&comment_path, Some(&stranger_token), json!({"text": "Hijack"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&comment_path, Some(&author_token), json!({"text": "Edited"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Edited");

    let (status, _) = app.delete(&comment_path, Some(&moderator_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&comment_path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_are_scoped_to_their_review() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, alice_token) = app.seed_with_token("alice", Role::User).await;
    let (_, bob_token) = app.seed_with_token("bob", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    let (_, alice_review) = post_review(&app, &title_id, &alice_token, "Hers", 7).await;
    let (_, bob_review) = post_review(&app, &title_id, &bob_token, "His", 6).await;
    let (_, comment) = app
        .post(
            &format!(
                "/v1/titles/{}/reviews/{}/comments/",
                title_id,
                alice_review["id"].as_str().unwrap()
            ),
            Some(&bob_token),
            json!({"text": "On Alice's review"}),
        )
        .await;

    // The right comment id under the wrong review is not found.
    let (status, _) = app
        .get(
            &format!(
                "/v1/titles/{}/reviews/{}/comments/{}/",
                title_id,
                bob_review["id"].as_str().unwrap(),
                comment["id"].as_str().unwrap()
            ),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_review_takes_its_comments_with_it() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, author_token) = app.seed_with_token("author", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    let (_, review) = post_review(&app, &title_id, &author_token, "Short-lived", 5).await;
    let review_id = review["id"].as_str().unwrap();
    let (_, comment) = app
        .post(
            &format!("/v1/titles/{}/reviews/{}/comments/", title_id, review_id),
            Some(&author_token),
            json!({"text": "Also short-lived"}),
        )
        .await;
    let comment_path = format!(
        "/v1/titles/{}/reviews/{}/comments/{}/",
        title_id,
        review_id,
        comment["id"].as_str().unwrap()
    );

    let (status, _) = app
        .delete(
            &format!("/v1/titles/{}/reviews/{}/", title_id, review_id),
            Some(&author_token),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&comment_path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_title_takes_its_reviews_with_it() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, reader_token) = app.seed_with_token("reader", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;
    post_review(&app, &title_id, &reader_token, "Doomed", 5).await;

    let (status, _) = app
        .delete(&format!("/v1/titles/{}/", title_id), Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .get(&format!("/v1/titles/{}/reviews/", title_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_an_account_removes_everything_it_wrote() {
    let app = test_app();
    let (_, admin_token) = app.seed_with_token("admin", Role::Admin).await;
    let (_, doomed_token) = app.seed_with_token("doomed", Role::User).await;
    let (_, keeper_token) = app.seed_with_token("keeper", Role::User).await;
    let title_id = seed_title(&app, &admin_token, "Dune").await;

    post_review(&app, &title_id, &doomed_token, "By the doomed account", 4).await;
    let (_, kept_review) = post_review(&app, &title_id, &keeper_token, "By the keeper", 8).await;
    app.post(
        &format!(
            "/v1/titles/{}/reviews/{}/comments/",
            title_id,
            kept_review["id"].as_str().unwrap()
        ),
        Some(&doomed_token),
        json!({"text": "Doomed comment on a kept review"}),
    )
    .await;

    let (status, _) = app
        .delete("/v1/users/doomed/", Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, reviews) = app
        .get(&format!("/v1/titles/{}/reviews/", title_id), None)
        .await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["author"], "keeper");

    let (_, comments) = app
        .get(
            &format!(
                "/v1/titles/{}/reviews/{}/comments/",
                title_id,
                kept_review["id"].as_str().unwrap()
            ),
            None,
        )
        .await;
    assert_eq!(comments.as_array().unwrap().len(), 0);

    // The rating follows the surviving reviews.
    let (_, title) = app.get(&format!("/v1/titles/{}/", title_id), None).await;
    assert_eq!(title["rating"], 8.0);
}
