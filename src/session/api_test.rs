use super::*;
use crate::session::test_server::{VALID_PASSWORD, VALID_USERNAME, spawn_auth_server, unreachable_base_url};
use serde_json::json;

// =============================================================================
// rejection_detail
// =============================================================================

#[test]
fn rejection_detail_reads_string_detail() {
    let body = json!({ "detail": "username taken" });
    assert_eq!(rejection_detail(Some(&body)), Some("username taken"));
}

#[test]
fn rejection_detail_ignores_missing_empty_and_non_string() {
    assert_eq!(rejection_detail(None), None);
    assert_eq!(rejection_detail(Some(&json!({}))), None);
    assert_eq!(rejection_detail(Some(&json!({ "detail": "  " }))), None);
    assert_eq!(rejection_detail(Some(&json!({ "detail": [{ "msg": "x" }] }))), None);
}

// =============================================================================
// AuthApi
// =============================================================================

#[test]
fn base_url_trailing_slash_is_trimmed() {
    let api = AuthApi::new("http://localhost:8005/api/auth/").unwrap();
    assert_eq!(api.base_url(), "http://localhost:8005/api/auth");
}

#[tokio::test]
async fn login_decodes_success_body() {
    let server = spawn_auth_server().await;
    let api = AuthApi::new(&server.base_url).unwrap();

    let response = api.login(VALID_USERNAME, VALID_PASSWORD).await.unwrap();
    assert_eq!(
        response,
        LoginResponse {
            access_token: "abc".into(),
            token_type: Some("bearer".into()),
            username: "bob".into(),
            nickname: "Bob".into(),
            avatar: "a.png".into(),
        }
    );
}

#[tokio::test]
async fn login_rejection_uses_fixed_message_not_server_detail() {
    let server = spawn_auth_server().await;
    let api = AuthApi::new(&server.base_url).unwrap();

    let err = api.login("bob", "wrong").await.unwrap_err();
    match err {
        AuthError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, LOGIN_FAILED_MESSAGE);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn login_with_undecodable_body_is_invalid_response() {
    let server = spawn_auth_server().await;
    let api = AuthApi::new(&server.base_url).unwrap();

    let err = api.login("garbled", "x").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn login_without_server_is_network_error() {
    let api = AuthApi::new(&unreachable_base_url()).unwrap();
    let err = api.login("bob", "secret").await.unwrap_err();
    assert!(matches!(err, AuthError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn register_falls_back_when_detail_unusable() {
    let server = spawn_auth_server().await;
    let api = AuthApi::new(&server.base_url).unwrap();

    for username in ["invalid", "crash"] {
        let request = RegisterRequest { username, password: "pw", nickname: "n" };
        let err = api.register(&request).await.unwrap_err();
        assert_eq!(err.to_string(), REGISTER_FAILED_MESSAGE, "username {username}");
    }
}

#[tokio::test]
async fn register_success_ignores_body() {
    let server = spawn_auth_server().await;
    let api = AuthApi::new(&server.base_url).unwrap();

    let request = RegisterRequest { username: "alice", password: "pw", nickname: "Alice" };
    assert!(api.register(&request).await.is_ok());
}
