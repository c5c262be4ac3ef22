// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth Service errors.
//!
//! HTTP failures arrive as `{ "message": string | string[] }` bodies; a
//! request that never got a response is reported as [`AuthServiceError::Connectivity`].

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthServiceError {
    /// No response at all (DNS, refused connection, timeout).
    #[error("could not reach the Auth Service: {0}")]
    Connectivity(String),

    /// The service answered with a non-success status.
    #[error("Auth Service returned {status}: {}", .messages.join("; "))]
    Status { status: u16, messages: Vec<String> },

    #[error("Auth Service response was invalid: {0}")]
    InvalidResponse(String),

    #[error("request could not be built: {0}")]
    InvalidRequest(String),

    #[error("Auth Service client misconfigured: {0}")]
    Configuration(String),

    #[error("no active session")]
    NotAuthenticated,
}

impl AuthServiceError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthServiceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 4xx responses carry field-level messages.
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    pub fn messages(&self) -> &[String] {
        match self {
            AuthServiceError::Status { messages, .. } => messages,
            _ => &[],
        }
    }

    /// First server message, or a fallback.
    pub fn first_message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.messages()
            .iter()
            .map(String::as_str)
            .find(|m| !m.trim().is_empty())
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<MessageField>,
}

/// Build a [`AuthServiceError::Status`] from a failed response body.
pub fn status_error(status: u16, body: &str) -> AuthServiceError {
    let messages = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(MessageField::One(message)),
        }) => vec![message],
        Ok(ErrorBody {
            message: Some(MessageField::Many(messages)),
        }) => messages,
        Ok(ErrorBody { message: None }) => Vec::new(),
        Err(_) => {
            let text = body.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        }
    };

    AuthServiceError::Status { status, messages }
}
