//! Session store: login / register / logout over an injected storage area.
//!
//! LIFECYCLE
//! =========
//! 1. Construction reads the persisted token once; a present token means
//!    `is_logged_in = true` with no user profile.
//! 2. Successful login replaces the whole session and persists the token.
//! 3. Logout clears everything and removes the persisted token.
//!
//! Registration never changes the session.

use std::sync::Arc;

use tokio::sync::watch;

use super::api::{AuthApi, LoginResponse, RegisterRequest};
use super::{AuthError, AuthOutcome, Session, UserProfile};
use crate::config::ClientConfig;
use crate::observable::Observable;
use crate::storage::KeyValueStore;

/// Storage key holding the access token.
pub const TOKEN_STORAGE_KEY: &str = "access_token";

/// Explicit session context; clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    api: AuthApi,
    storage: Arc<dyn KeyValueStore>,
    state: Observable<Session>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("api_base", &self.api.base_url())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(api: AuthApi, storage: Arc<dyn KeyValueStore>) -> Self {
        let token = match storage.get(TOKEN_STORAGE_KEY) {
            Ok(token) => token.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted token; starting logged out");
                String::new()
            }
        };
        Self {
            api,
            storage,
            state: Observable::new(Session::restored(token)),
        }
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Client`] if the HTTP client cannot be initialized.
    pub fn from_config(config: &ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self, AuthError> {
        Ok(Self::new(AuthApi::new(&config.api_base)?, storage))
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.state.get()
    }

    #[must_use]
    pub fn token(&self) -> String {
        self.state.with(|s| s.token.clone())
    }

    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.state.with(|s| s.user.clone())
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.with(|s| s.is_logged_in)
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.state.update(|s| s.is_logged_in = logged_in);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthOutcome {
        match self.api.login(username, password).await {
            Ok(response) => {
                self.apply_login(response);
                AuthOutcome::ok()
            }
            Err(e) => {
                tracing::error!(error = %e, %username, "login failed");
                AuthOutcome::failed(e.to_string())
            }
        }
    }

    pub async fn register(&self, username: &str, password: &str, nickname: &str) -> AuthOutcome {
        let request = RegisterRequest {
            username,
            password,
            nickname,
        };
        let result: Result<(), AuthError> = self.api.register(&request).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, %username, "registration failed");
        }
        result.into()
    }

    pub fn logout(&self) {
        self.state.set(Session::default());
        if let Err(e) = self.storage.remove(TOKEN_STORAGE_KEY) {
            tracing::warn!(error = %e, "failed to remove persisted token");
        }
        tracing::info!("logged out");
    }

    fn apply_login(&self, response: LoginResponse) {
        let LoginResponse {
            access_token,
            username,
            nickname,
            avatar,
            ..
        } = response;

        if let Err(e) = self.storage.set(TOKEN_STORAGE_KEY, &access_token) {
            tracing::warn!(error = %e, "failed to persist access token; session kept in memory only");
        }
        tracing::info!(%username, "logged in");
        self.state.set(Session {
            user: Some(UserProfile {
                username,
                nickname,
                avatar,
            }),
            token: access_token,
            is_logged_in: true,
        });
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
