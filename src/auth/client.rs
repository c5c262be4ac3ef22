// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the Auth Service.
//!
//! ## Endpoints
//!
//! | Call | Route |
//! |------|-------|
//! | login | `POST /auth/login` |
//! | register importer | `POST /auth/register/importator` (multipart) |
//! | send / verify OTP | `POST /auth/send-otp`, `POST /auth/verify-otp` |
//! | forgot / reset password | `POST /auth/forgot-password`, `POST /auth/reset-password` |
//! | logout | `POST /auth/logout` |
//! | profile | `GET /auth/profile` |
//!
//! Tokens from a successful login are kept in memory only.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

use super::error::status_error;
use super::{AuthService, AuthServiceError, LoginResponse, RegistrationPayload, RegistrationResponse};

/// Tokens and user returned by login.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<Value>,
}

/// Auth Service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuthService {
    base_url: String,
    http: Client,
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl HttpAuthService {
    pub fn new(config: &ClientConfig) -> Result<Self, AuthServiceError> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AuthServiceError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.api_base_url.as_str().trim_end_matches('/').to_string(),
            http,
            session: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current login session, if any.
    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    /// Revoke the refresh token server-side and forget the session.
    ///
    /// The local session is cleared even if the server call fails.
    pub async fn logout(&self) {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone());

        if let Some(refresh_token) = refresh_token {
            let body = json!({ "refreshToken": refresh_token });
            if let Err(e) = self.post_json("/auth/logout", &body).await {
                warn!(error = %e, "Logout request failed");
            }
        }

        *self.session.write().await = None;
        info!("Signed out");
    }

    /// Fetch the signed-in user's profile.
    pub async fn profile(&self) -> Result<Value, AuthServiceError> {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(AuthServiceError::NotAuthenticated)?;

        let request = self
            .http
            .get(self.url("/auth/profile"))
            .bearer_auth(token);
        self.execute("/auth/profile", request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Value, AuthServiceError> {
        let request = self.http.post(self.url(path)).json(body);
        self.execute(path, request).await
    }

    async fn execute(&self, path: &str, request: RequestBuilder) -> Result<Value, AuthServiceError> {
        let response = request.send().await.map_err(|e| {
            warn!(path, error = %e, "Auth Service unreachable");
            AuthServiceError::Connectivity(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthServiceError::Connectivity(format!("{path}: failed to read body: {e}")))?;

        if !status.is_success() {
            debug!(path, status = status.as_u16(), "Auth Service returned an error");
            return Err(status_error(status.as_u16(), &body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| AuthServiceError::InvalidResponse(format!("{path} invalid JSON: {e}")))
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthServiceError> {
        let value = self
            .post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await?;
        let response: LoginResponse = serde_json::from_value(value)
            .map_err(|e| AuthServiceError::InvalidResponse(format!("login: {e}")))?;

        if let Some(access_token) = response.access_token.clone() {
            *self.session.write().await = Some(AuthSession {
                access_token,
                refresh_token: response.refresh_token.clone(),
                user: response.user.clone(),
            });
            info!("Signed in");
        }

        Ok(response)
    }

    async fn register_importator(
        &self,
        payload: RegistrationPayload,
    ) -> Result<RegistrationResponse, AuthServiceError> {
        let path = "/auth/register/importator";
        let form = payload.into_form()?;
        let request = self.http.post(self.url(path)).multipart(form);
        let value = self.execute(path, request).await?;
        Ok(RegistrationResponse::from_value(value))
    }

    async fn send_otp(&self, user_id: &str) -> Result<(), AuthServiceError> {
        self.post_json("/auth/send-otp", &json!({ "userId": user_id }))
            .await
            .map(|_| ())
    }

    async fn verify_otp(&self, user_id: &str, code: &str) -> Result<(), AuthServiceError> {
        self.post_json("/auth/verify-otp", &json!({ "userId": user_id, "code": code }))
            .await
            .map(|_| ())
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthServiceError> {
        self.post_json("/auth/forgot-password", &json!({ "email": email }))
            .await
            .map(|_| ())
    }

    async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AuthServiceError> {
        let body = json!({
            "email": email,
            "otp": otp,
            "newPassword": new_password
        });
        self.post_json("/auth/reset-password", &body)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(base: &str) -> ClientConfig {
        ClientConfig {
            api_base_url: base.parse().unwrap(),
            http_timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn base_url_has_no_trailing_slash() {
        let client = HttpAuthService::new(&config("https://api.importers.dz/v1/")).unwrap();
        assert_eq!(client.base_url(), "https://api.importers.dz/v1");
        assert_eq!(client.url("/auth/login"), "https://api.importers.dz/v1/auth/login");
    }

    #[tokio::test]
    async fn profile_requires_a_session() {
        let client = HttpAuthService::new(&config("http://127.0.0.1:9")).unwrap();
        assert_eq!(client.profile().await, Err(AuthServiceError::NotAuthenticated));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_connectivity_error() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let client = HttpAuthService::new(&config("http://127.0.0.1:9")).unwrap();
        let err = client.send_otp("u1").await.unwrap_err();
        assert!(matches!(err, AuthServiceError::Connectivity(_)), "{err:?}");
    }

    #[tokio::test]
    async fn logout_without_session_clears_nothing_and_succeeds() {
        let client = HttpAuthService::new(&config("http://127.0.0.1:9")).unwrap();
        client.logout().await;
        assert!(client.session().await.is_none());
    }
}
