//! In-process stand-in for the auth API, bound to an ephemeral port.

use axum::Router;
use axum::extract::{Form, Json};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub(crate) const VALID_USERNAME: &str = "bob";
pub(crate) const VALID_PASSWORD: &str = "secret";

pub(crate) struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(Form(form): Form<LoginForm>) -> Response {
    match (form.username.as_str(), form.password.as_str()) {
        (VALID_USERNAME, VALID_PASSWORD) => Json(json!({
            "access_token": "abc",
            "token_type": "bearer",
            "username": "bob",
            "nickname": "Bob",
            "avatar": "a.png"
        }))
        .into_response(),
        ("garbled", _) => (StatusCode::OK, "<html>not json</html>").into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "wrong username or password" }))).into_response(),
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    match body.get("username").and_then(Value::as_str).unwrap_or_default() {
        "taken" => (StatusCode::BAD_REQUEST, Json(json!({ "detail": "username taken" }))).into_response(),
        "invalid" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [{ "loc": ["body", "nickname"], "msg": "field required" }] })),
        )
            .into_response(),
        "crash" => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
        username => Json(json!({
            "id": 1,
            "username": username,
            "nickname": body.get("nickname").cloned().unwrap_or(Value::Null),
            "avatar": "default.png"
        }))
        .into_response(),
    }
}

pub(crate) async fn spawn_auth_server() -> TestServer {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("test listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        base_url: format!("http://{addr}/api/auth"),
        handle,
    }
}

/// Base URL that refuses connections.
pub(crate) fn unreachable_base_url() -> String {
    "http://127.0.0.1:1/api/auth".to_owned()
}
