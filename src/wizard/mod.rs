// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Onboarding wizard: validation, backend error routing, the state machine,
//! and the [`OnboardingWizard`] that ties them to the camera and the
//! submission pipeline.

pub mod server_errors;
pub mod session;
pub mod state_machine;
pub mod validation;

pub use session::{OnboardingWizard, StepBadge};
pub use state_machine::{FillingState, WizardAction, WizardEvent, WizardState, WizardStateMachine};
pub use validation::{is_step_complete, validate, ValidationIssue, ValidationResult};
