// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Importer Onboarding - sign-up wizard core for importer accounts
//!
//! Collects business details, credentials, identity documents and a live
//! selfie over four steps, then registers the importer with the Auth Service
//! and confirms the account with an emailed one-time code.
//!
//! ## Modules
//!
//! - `models` - Wizard snapshot, steps, field ownership, artifacts
//! - `wizard` - Validation, backend error routing, state machine, orchestrator
//! - `capture` - Scoped selfie camera sessions and JPEG encoding
//! - `submission` - Register, send-OTP and verify-OTP pipeline
//! - `auth` - Auth Service port and HTTP client
//! - `password_reset` - Forgot-password flow
//! - `config` / `telemetry` - Environment configuration and tracing setup

pub mod auth;
pub mod capture;
pub mod config;
pub mod error;
pub mod models;
pub mod password_reset;
pub mod submission;
pub mod telemetry;
pub mod wizard;

pub use error::OnboardingError;
