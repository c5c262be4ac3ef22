// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth Service port and its HTTP implementation.
//!
//! The wizard only talks to the backend through [`AuthService`], so tests
//! and alternative transports can stand in for [`HttpAuthService`].

pub mod client;
pub mod error;
pub mod payload;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub use client::{AuthSession, HttpAuthService};
pub use error::AuthServiceError;
pub use payload::RegistrationPayload;

/// Body of a successful login.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<Value>,
}

/// Body of a successful importer registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResponse {
    /// Created user, if the backend expects OTP confirmation.
    pub user_id: Option<String>,
    pub raw: Value,
}

impl RegistrationResponse {
    /// Accepts both `{importatorProfile:{user:{userId}}}` and `{userId}`.
    pub fn from_value(raw: Value) -> Self {
        let user_id = ["/importatorProfile/user/userId", "/userId"]
            .iter()
            .find_map(|pointer| raw.pointer(pointer).and_then(id_to_string));
        Self { user_id, raw }
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Remote authentication and registration backend.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthServiceError>;

    async fn register_importator(
        &self,
        payload: RegistrationPayload,
    ) -> Result<RegistrationResponse, AuthServiceError>;

    async fn send_otp(&self, user_id: &str) -> Result<(), AuthServiceError>;

    async fn verify_otp(&self, user_id: &str, code: &str) -> Result<(), AuthServiceError>;

    async fn forgot_password(&self, email: &str) -> Result<(), AuthServiceError>;

    async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AuthServiceError>;
}
