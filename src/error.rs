// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crate-level error type.
//!
//! Each component keeps its own error enum; [`OnboardingError`] wraps them
//! for callers that drive the whole flow, such as the demo binary.

use std::path::PathBuf;

use crate::auth::AuthServiceError;
use crate::capture::{CaptureError, DeviceError};
use crate::config::ConfigError;
use crate::models::ArtifactError;
use crate::password_reset::ResetError;
use crate::submission::{OtpError, SubmissionError};

#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("auth service error: {0}")]
    Auth(#[from] AuthServiceError),

    #[error("document error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("camera error: {0}")]
    Device(#[from] DeviceError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("verification error: {0}")]
    Otp(#[from] OtpError),

    #[error("password reset error: {0}")]
    Reset(#[from] ResetError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid form file {path}: {reason}")]
    FormFile { path: PathBuf, reason: String },

    /// The wizard stopped with errors still displayed.
    #[error("registration incomplete: {}", .0.join("; "))]
    Incomplete(Vec<String>),

    #[error("account created but email not confirmed")]
    Unconfirmed,
}
