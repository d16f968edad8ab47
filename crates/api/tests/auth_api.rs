//! Integration tests for the `/auth` resource.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, get, get_auth, post_auth, post_json, post_json_auth, signup,
};
use serde_json::json;

const PASSWORD: &str = "correct horse";

// ---------------------------------------------------------------------------
// Test: session without a token establishes an anonymous identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_without_token_signs_in_anonymously() {
    let app = build_test_app();

    let response = post_json(&app.router, "/api/v1/auth/session", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["user"]["is_anonymous"], true);
    assert!(json["user"]["email"].is_null());
}

// ---------------------------------------------------------------------------
// Test: session with a valid token resumes without issuing new tokens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_with_token_resumes_identity() {
    let app = build_test_app();
    let first = body_json(post_json(&app.router, "/api/v1/auth/session", json!({})).await).await;
    let token = first["access_token"].as_str().unwrap();

    let response =
        post_json_auth(&app.router, "/api/v1/auth/session", json!({}), token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["user"]["id"], first["user"]["id"]);
    assert!(json.get("access_token").is_none());
}

// ---------------------------------------------------------------------------
// Test: signup returns 201 with tokens and a registered identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signup_returns_registered_identity() {
    let app = build_test_app();

    let json = signup(&app.router, "  Poet@Example.com ", PASSWORD).await;

    assert_eq!(json["user"]["email"], "poet@example.com");
    assert_eq!(json["user"]["is_anonymous"], false);
    assert!(json["expires_in"].as_i64().unwrap() > 0);
}

// ---------------------------------------------------------------------------
// Test: duplicate email and weak passwords are rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = build_test_app();
    signup(&app.router, "poet@example.com", PASSWORD).await;

    let response = post_json(
        &app.router,
        "/api/v1/auth/signup",
        json!({ "email": "POET@example.com", "password": PASSWORD }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn short_password_is_rejected() {
    let app = build_test_app();

    let response = post_json(
        &app.router,
        "/api/v1/auth/signup",
        json!({ "email": "poet@example.com", "password": "short" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: login succeeds with the right password, fails with the wrong one
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_with_valid_credentials() {
    let app = build_test_app();
    let registered = signup(&app.router, "poet@example.com", PASSWORD).await;

    let response = post_json(
        &app.router,
        "/api/v1/auth/login",
        json!({ "email": "poet@example.com", "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["user"]["id"], registered["user"]["id"]);
    assert!(json["access_token"].is_string());
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = build_test_app();
    signup(&app.router, "poet@example.com", PASSWORD).await;

    let response = post_json(
        &app.router,
        "/api/v1/auth/login",
        json!({ "email": "poet@example.com", "password": "wrong password" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Five consecutive failures lock the account, even for the right password.
#[tokio::test]
async fn repeated_failures_lock_the_account() {
    let app = build_test_app();
    signup(&app.router, "poet@example.com", PASSWORD).await;

    for _ in 0..5 {
        let response = post_json(
            &app.router,
            "/api/v1/auth/login",
            json!({ "email": "poet@example.com", "password": "wrong password" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = post_json(
        &app.router,
        "/api/v1/auth/login",
        json!({ "email": "poet@example.com", "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Test: refresh tokens rotate and are single-use
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_rotates_the_token() {
    let app = build_test_app();
    let registered = signup(&app.router, "poet@example.com", PASSWORD).await;
    let refresh_token = registered["refresh_token"].as_str().unwrap();

    let response = post_json(
        &app.router,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    assert_ne!(rotated["refresh_token"], registered["refresh_token"]);

    let reuse = post_json(
        &app.router,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(reuse.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Test: logout revokes every refresh token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logout_revokes_refresh_tokens() {
    let app = build_test_app();
    let registered = signup(&app.router, "poet@example.com", PASSWORD).await;
    let access = registered["access_token"].as_str().unwrap();

    let response = post_auth(&app.router, "/api/v1/auth/logout", access).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        &app.router,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": registered["refresh_token"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Test: password reset mails a token that sets a new password
// ---------------------------------------------------------------------------

#[tokio::test]
async fn password_reset_round_trip() {
    let app = build_test_app();
    signup(&app.router, "poet@example.com", PASSWORD).await;

    let response = post_json(
        &app.router,
        "/api/v1/auth/password-reset",
        json!({ "email": "poet@example.com" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "poet@example.com");
    let token = sent[0]
        .body
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap()
        .to_string();

    let response = post_json(
        &app.router,
        "/api/v1/auth/password-reset/confirm",
        json!({ "token": token, "new_password": "a brand new secret" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let old = post_json(
        &app.router,
        "/api/v1/auth/login",
        json!({ "email": "poet@example.com", "password": PASSWORD }),
    )
    .await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = post_json(
        &app.router,
        "/api/v1/auth/login",
        json!({ "email": "poet@example.com", "password": "a brand new secret" }),
    )
    .await;
    assert_eq!(new.status(), StatusCode::OK);

    let reuse = post_json(
        &app.router,
        "/api/v1/auth/password-reset/confirm",
        json!({ "token": token, "new_password": "yet another secret" }),
    )
    .await;
    assert_eq!(reuse.status(), StatusCode::BAD_REQUEST);
}

/// Unknown emails get the same answer and no mail.
#[tokio::test]
async fn password_reset_for_unknown_email_is_silent() {
    let app = build_test_app();

    let response = post_json(
        &app.router,
        "/api/v1/auth/password-reset",
        json!({ "email": "nobody@example.com" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(app.mailer.sent().is_empty());
}

// ---------------------------------------------------------------------------
// Test: /me requires a token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn me_returns_current_identity() {
    let app = build_test_app();
    let registered = signup(&app.router, "poet@example.com", PASSWORD).await;
    let access = registered["access_token"].as_str().unwrap();

    let response = get_auth(&app.router, "/api/v1/auth/me", access).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "poet@example.com");

    let anonymous = get(&app.router, "/api/v1/auth/me").await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
