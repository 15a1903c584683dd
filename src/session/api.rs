//! REST helpers for the auth API (`{API_BASE}/login`, `{API_BASE}/register`).
//!
//! No request timeout is configured; calls wait on the HTTP client defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AuthError, LOGIN_FAILED_MESSAGE, REGISTER_FAILED_MESSAGE};

/// Successful login body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub nickname: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl AuthApi {
    /// # Errors
    ///
    /// Returns [`AuthError::Client`] if the HTTP client cannot be initialized.
    pub fn new(base_url: &str) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder().build().map_err(AuthError::Client)?;
        Ok(Self::with_client(http, base_url))
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /login` with form-encoded credentials.
    ///
    /// # Errors
    ///
    /// Any non-2xx status maps to [`AuthError::Rejected`] carrying
    /// [`LOGIN_FAILED_MESSAGE`]; the server's error body is not consulted.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let response = self
            .http
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(AuthError::Network)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "login rejected by auth server");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: LOGIN_FAILED_MESSAGE.to_owned(),
            });
        }

        response
            .json::<LoginResponse>()
            .await
            .map_err(AuthError::InvalidResponse)
    }

    /// `POST /register` with a JSON body. The success body is ignored.
    ///
    /// # Errors
    ///
    /// Non-2xx maps to [`AuthError::Rejected`] using the body's `detail`
    /// string when present, else [`REGISTER_FAILED_MESSAGE`].
    pub async fn register(&self, request: &RegisterRequest<'_>) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.url("/register"))
            .json(request)
            .send()
            .await
            .map_err(AuthError::Network)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.json::<Value>().await.ok();
        Err(AuthError::Rejected {
            status: status.as_u16(),
            message: rejection_detail(body.as_ref()).unwrap_or(REGISTER_FAILED_MESSAGE).to_owned(),
        })
    }
}

/// Non-empty string `detail` from an error body. FastAPI validation errors
/// put an array there, which is treated as absent.
pub(crate) fn rejection_detail(body: Option<&Value>) -> Option<&str> {
    body?
        .get("detail")
        .and_then(Value::as_str)
        .filter(|detail| !detail.trim().is_empty())
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
