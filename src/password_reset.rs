// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Forgot-password flow.
//!
//! | Step | Action | Auth Service call |
//! |------|--------|-------------------|
//! | `RequestCode` | send code to email | `forgotPassword(email)` |
//! | `VerifyCode` | enter the 6-digit code | none; the code travels with the reset |
//! | `NewPassword` | choose and confirm a password | `resetPassword(email, otp, newPassword)` |
//! | `Done` | terminal | |
//!
//! A failed action keeps the current step and records one retryable message.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{AuthService, AuthServiceError};
use crate::submission::{NETWORK_ERROR_MESSAGE, SERVER_ERROR_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStep {
    RequestCode,
    VerifyCode,
    NewPassword,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResetError {
    #[error("Email is required")]
    EmailRequired,

    #[error("Enter the 6-digit verification code")]
    InvalidCode,

    #[error("Passwords do not match or are empty.")]
    PasswordMismatch,

    #[error("action not available at this step")]
    WrongStep,

    #[error("{0}")]
    Rejected(String),
}

impl ResetError {
    fn from_auth(err: AuthServiceError, fallback: &str) -> Self {
        let message = match &err {
            AuthServiceError::Connectivity(_) => NETWORK_ERROR_MESSAGE,
            e if e.is_client_error() => e.first_message_or(fallback),
            _ => SERVER_ERROR_MESSAGE,
        };
        ResetError::Rejected(message.to_string())
    }
}

pub struct PasswordResetFlow<A: AuthService + ?Sized> {
    auth: Arc<A>,
    step: ResetStep,
    email: String,
    code: String,
    error: Option<String>,
}

impl<A: AuthService + ?Sized> PasswordResetFlow<A> {
    pub fn new(auth: Arc<A>) -> Self {
        Self {
            auth,
            step: ResetStep::RequestCode,
            email: String::new(),
            code: String::new(),
            error: None,
        }
    }

    pub fn step(&self) -> ResetStep {
        self.step
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Message from the last failed action.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Ask the Auth Service to email a reset code.
    pub async fn send_code(&mut self, email: &str) -> Result<(), ResetError> {
        self.expect_step(ResetStep::RequestCode)?;
        let email = email.trim();
        if email.is_empty() {
            return self.fail(ResetError::EmailRequired);
        }

        let result = self.auth.forgot_password(email).await;
        if let Err(e) = result {
            warn!(error = %e, "Password reset code request failed");
            return self.fail(ResetError::from_auth(e, "Could not send the reset code."));
        }

        info!("Password reset code sent");
        self.email = email.to_string();
        self.advance(ResetStep::VerifyCode);
        Ok(())
    }

    /// Accept the emailed code. Only its shape is checked here.
    pub fn verify_code(&mut self, code: &str) -> Result<(), ResetError> {
        self.expect_step(ResetStep::VerifyCode)?;
        let code = code.trim();
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return self.fail(ResetError::InvalidCode);
        }
        self.code = code.to_string();
        self.advance(ResetStep::NewPassword);
        Ok(())
    }

    /// Set the new password with the stored email and code.
    pub async fn reset(&mut self, new_password: &str, confirm: &str) -> Result<(), ResetError> {
        self.expect_step(ResetStep::NewPassword)?;
        if new_password.is_empty() || new_password != confirm {
            return self.fail(ResetError::PasswordMismatch);
        }

        let result = self
            .auth
            .reset_password(&self.email, &self.code, new_password)
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Password reset rejected");
            return self.fail(ResetError::from_auth(e, "Invalid or expired code."));
        }

        info!("Password reset completed");
        self.advance(ResetStep::Done);
        Ok(())
    }

    /// "Back". Returns `true` when leaving the flow from the first step.
    pub fn back(&mut self) -> bool {
        let previous = match self.step {
            ResetStep::RequestCode => return true,
            ResetStep::VerifyCode => ResetStep::RequestCode,
            ResetStep::NewPassword => ResetStep::VerifyCode,
            ResetStep::Done => return true,
        };
        self.advance(previous);
        false
    }

    fn expect_step(&self, step: ResetStep) -> Result<(), ResetError> {
        if self.step == step {
            Ok(())
        } else {
            Err(ResetError::WrongStep)
        }
    }

    fn advance(&mut self, step: ResetStep) {
        self.step = step;
        self.error = None;
    }

    fn fail(&mut self, err: ResetError) -> Result<(), ResetError> {
        self.error = Some(err.to_string());
        Err(err)
    }
}
