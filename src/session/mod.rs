//! Authentication session: current user, access token, login state.
//!
//! DESIGN
//! ======
//! `api` is the HTTP boundary and returns typed `Result`s. `store` owns the
//! session state and converts every failure into an [`AuthOutcome`] at the
//! operation boundary, so UI callers only ever branch on `success`.
//!
//! ERROR HANDLING
//! ==============
//! Three failure kinds reach the outcome: transport failures (no response),
//! rejections (non-2xx), and undecodable success bodies. None of them touch
//! session state.

pub mod api;
pub mod store;

#[cfg(test)]
pub(crate) mod test_server;

use serde::{Deserialize, Serialize};

pub use api::AuthApi;
pub use store::{SessionStore, TOKEN_STORAGE_KEY};

/// User-facing message for any non-2xx login response.
pub const LOGIN_FAILED_MESSAGE: &str = "login failed, check credentials";
/// Fallback when a registration rejection carries no usable `detail`.
pub const REGISTER_FAILED_MESSAGE: &str = "registration failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub nickname: String,
    pub avatar: String,
}

/// Snapshot of the authentication session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: Option<UserProfile>,
    /// Empty string means no token.
    pub token: String,
    pub is_logged_in: bool,
}

impl Session {
    /// Session rebuilt from a persisted token. A present token counts as
    /// logged in; it is not re-validated against the server.
    #[must_use]
    pub fn restored(token: String) -> Self {
        let is_logged_in = !token.is_empty();
        Self {
            user: None,
            token,
            is_logged_in,
        }
    }
}

/// Uniform result of `login` / `register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl AuthOutcome {
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true, msg: None }
    }

    #[must_use]
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: Some(msg.into()),
        }
    }
}

impl<T> From<Result<T, AuthError>> for AuthOutcome {
    fn from(result: Result<T, AuthError>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// A 2xx response whose body could not be decoded.
    #[error("invalid response from auth server: {0}")]
    InvalidResponse(#[source] reqwest::Error),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}
