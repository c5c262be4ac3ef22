// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Onboarding Wizard
//!
//! [`OnboardingWizard`] owns everything one sign-up attempt needs: the
//! snapshot, the current [`WizardState`], the selfie camera and the
//! submission pipeline. User actions feed [`WizardEvent`]s through the pure
//! state machine; requested [`WizardAction`]s are executed here.
//!
//! ## Teardown
//!
//! [`OnboardingWizard::teardown`] (or dropping the wizard) releases the
//! camera and cancels the wizard's token. A submission or OTP call still in
//! flight is abandoned and its late result is never applied. Callers that
//! navigate away while a call is pending cancel through
//! [`OnboardingWizard::teardown_token`].

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthService;
use crate::capture::{CameraDevice, CaptureController, CaptureError, DeviceError};
use crate::models::{Artifact, Field, SelfieImage, Step, WizardSnapshot};
use crate::submission::{RegistrationOutcome, SubmissionError, SubmissionPipeline};

use super::state_machine::{WizardAction, WizardEvent, WizardState, WizardStateMachine};
use super::validation::{is_step_complete, validate, ValidationIssue};

/// Progress indicator state of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepBadge {
    Pending,
    Active,
    Complete,
    /// Implicated by the displayed error list; overrides everything else.
    Error,
}

pub struct OnboardingWizard<A: AuthService + ?Sized, D: CameraDevice> {
    snapshot: WizardSnapshot,
    state: WizardState,
    camera: CaptureController<D>,
    camera_notice: Option<String>,
    pipeline: Arc<SubmissionPipeline<A>>,
    shutdown: CancellationToken,
}

impl<A: AuthService + ?Sized, D: CameraDevice> OnboardingWizard<A, D> {
    pub fn new(auth: Arc<A>, camera: D) -> Self {
        Self {
            snapshot: WizardSnapshot::new(),
            state: WizardState::default(),
            camera: CaptureController::new(camera),
            camera_notice: None,
            pipeline: Arc::new(SubmissionPipeline::new(auth)),
            shutdown: CancellationToken::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn snapshot(&self) -> &WizardSnapshot {
        &self.snapshot
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn current_step(&self) -> Option<Step> {
        self.state.current_step()
    }

    /// Displayed error list; empty outside form entry.
    pub fn errors(&self) -> &[ValidationIssue] {
        self.state
            .filling()
            .map(|f| f.errors.issues())
            .unwrap_or_default()
    }

    /// Retryable OTP error or notice, while waiting for the code.
    pub fn otp_error(&self) -> Option<&str> {
        match &self.state {
            WizardState::OtpPending { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.pipeline.is_busy()
    }

    pub fn is_torn_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Label of the "Continue" button, or `None` on the last step.
    pub fn continue_label(&self) -> Option<String> {
        self.current_step()
            .and_then(Step::next)
            .map(|next| format!("Continue to {}", next.label()))
    }

    /// Badge per step, in step order.
    pub fn step_badges(&self) -> [(Step, StepBadge); 4] {
        let selfie_present = self.snapshot.selfie.is_some();
        let errors = self.state.filling().map(|f| &f.errors);
        let current = self.current_step();

        Step::ALL.map(|step| {
            let badge = if errors.is_some_and(|e| e.implicates(step)) {
                StepBadge::Error
            } else if is_step_complete(step, &self.snapshot, selfie_present) {
                StepBadge::Complete
            } else if current == Some(step) {
                StepBadge::Active
            } else {
                StepBadge::Pending
            };
            (step, badge)
        })
    }

    // =========================================================================
    // Form entry
    // =========================================================================

    /// Edit a text field. Returns `false` if the field is not a text field.
    pub fn set_text(&mut self, field: Field, value: impl Into<String>) -> bool {
        if !self.accepts_edits() || !self.snapshot.set_text(field, value) {
            return false;
        }
        self.field_edited();
        true
    }

    /// Attach or clear a document. Returns `false` for non-document fields.
    pub fn set_document(&mut self, field: Field, artifact: Option<Artifact>) -> bool {
        if !self.accepts_edits() || !self.snapshot.set_document(field, artifact) {
            return false;
        }
        self.field_edited();
        true
    }

    /// "Continue". Never gated on completeness.
    pub fn next_step(&mut self) {
        self.dispatch(WizardEvent::Continue);
    }

    /// "Back". Returns `true` when the user is leaving the wizard from step 1.
    pub fn back(&mut self) -> bool {
        let actions = self.dispatch(WizardEvent::Back);
        actions.contains(&WizardAction::LeaveWizard)
    }

    fn accepts_edits(&self) -> bool {
        matches!(self.state, WizardState::Filling(_)) && !self.is_torn_down()
    }

    fn field_edited(&mut self) {
        let validation = validate(&self.snapshot, self.snapshot.selfie.is_some());
        self.dispatch(WizardEvent::FieldEdited { validation });
    }

    // =========================================================================
    // Selfie
    // =========================================================================

    pub fn camera_active(&self) -> bool {
        self.camera.is_active()
    }

    /// Notice from the last failed camera open, if any.
    pub fn camera_notice(&self) -> Option<&str> {
        self.camera_notice.as_deref()
    }

    pub fn selfie(&self) -> Option<&SelfieImage> {
        self.snapshot.selfie.as_ref()
    }

    /// Open the camera. A previously captured selfie is discarded (retake).
    pub fn start_camera(&mut self) -> Result<(), DeviceError> {
        if self.is_torn_down() {
            return Err(DeviceError::Unavailable("wizard closed".to_string()));
        }
        self.camera_notice = None;
        let had_selfie = self.snapshot.selfie.take().is_some();

        let result = self.camera.start();
        if let Err(e) = &result {
            self.camera_notice = Some(e.user_message().to_string());
        }
        if had_selfie {
            self.field_edited();
        }
        result
    }

    pub fn cancel_camera(&mut self) {
        self.camera.stop();
    }

    /// Capture the selfie. The camera is closed whatever the outcome.
    pub fn take_photo(&mut self) -> Result<(), CaptureError> {
        match self.camera.capture() {
            Ok(selfie) => {
                self.snapshot.selfie = Some(selfie);
                self.field_edited();
                Ok(())
            }
            Err(e) => {
                if let CaptureError::Device(device) = &e {
                    self.camera_notice = Some(device.user_message().to_string());
                }
                warn!(error = %e, "Selfie capture failed");
                Err(e)
            }
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// "Submit for verification" on the last step.
    ///
    /// Local validation failures relocate without any network call. Returns
    /// the resulting state.
    pub async fn submit(&mut self) -> &WizardState {
        let validation = validate(&self.snapshot, self.snapshot.selfie.is_some());
        let actions = self.dispatch(WizardEvent::SubmitRequested { validation });
        if !actions.contains(&WizardAction::SubmitRegistration) {
            return &self.state;
        }

        let pipeline = self.pipeline.clone();
        let shutdown = self.shutdown.clone();
        let result = tokio::select! {
            _ = shutdown.cancelled() => None,
            result = pipeline.submit(&mut self.snapshot) => Some(result),
        };

        let Some(result) = result.filter(|_| !self.is_torn_down()) else {
            info!("Wizard closed during submission; result discarded");
            return &self.state;
        };

        let event = match result {
            Ok(RegistrationOutcome::OtpRequired {
                user_id,
                otp_notice,
            }) => WizardEvent::OtpChallengeIssued {
                user_id,
                email: self.snapshot.email.trim().to_string(),
                notice: otp_notice,
            },
            Ok(RegistrationOutcome::AlreadyVerified) => WizardEvent::RegisteredWithoutChallenge,
            Err(SubmissionError::Busy) => {
                debug!("Submission already in flight");
                return &self.state;
            }
            Err(e) => WizardEvent::SubmissionFailed {
                errors: e.into_validation(),
            },
        };
        self.dispatch(event);
        &self.state
    }

    /// Confirm the emailed code.
    pub async fn verify_otp(&mut self, code: &str) -> &WizardState {
        let WizardState::OtpPending { user_id, .. } = &self.state else {
            return &self.state;
        };
        let user_id = user_id.clone();

        let pipeline = self.pipeline.clone();
        let shutdown = self.shutdown.clone();
        let result = tokio::select! {
            _ = shutdown.cancelled() => None,
            result = pipeline.verify_otp(&user_id, code) => Some(result),
        };
        let Some(result) = result.filter(|_| !self.is_torn_down()) else {
            info!("Wizard closed during OTP verification; result discarded");
            return &self.state;
        };

        let event = match result {
            Ok(()) => WizardEvent::OtpVerified,
            Err(e) => WizardEvent::OtpFailed {
                message: e.user_message(),
            },
        };
        self.dispatch(event);
        &self.state
    }

    /// "Resend code". The phase does not change.
    pub async fn resend_otp(&mut self) -> &WizardState {
        let actions = self.dispatch(WizardEvent::ResendOtp);
        let Some(user_id) = actions.into_iter().find_map(|action| match action {
            WizardAction::SendOtp { user_id } => Some(user_id),
            _ => None,
        }) else {
            return &self.state;
        };

        let pipeline = self.pipeline.clone();
        let shutdown = self.shutdown.clone();
        let result = tokio::select! {
            _ = shutdown.cancelled() => None,
            result = pipeline.resend_otp(&user_id) => Some(result),
        };
        let Some(result) = result.filter(|_| !self.is_torn_down()) else {
            info!("Wizard closed during OTP resend; result discarded");
            return &self.state;
        };

        self.dispatch(WizardEvent::OtpResent {
            error: result.err().map(|e| e.user_message()),
        });
        &self.state
    }

    /// "Wrong email? Change it". Returns to the credentials step.
    pub fn change_email(&mut self) {
        self.dispatch(WizardEvent::ChangeEmail);
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Token cancelled on teardown; cancel it to abandon a pending call.
    pub fn teardown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Release the camera and abandon any in-flight call. Idempotent.
    pub fn teardown(&mut self) {
        if !self.shutdown.is_cancelled() {
            info!(phase = self.state.phase_name(), "Onboarding wizard closed");
        }
        self.shutdown.cancel();
        self.camera.stop();
    }

    fn dispatch(&mut self, event: WizardEvent) -> Vec<WizardAction> {
        if self.is_torn_down() {
            debug!(?event, "Ignoring event after teardown");
            return Vec::new();
        }

        let previous = std::mem::take(&mut self.state);
        let from_phase = previous.phase_name();
        let from_step = previous.current_step();
        let (next, actions) = WizardStateMachine::transition(previous, event);

        if next.phase_name() != from_phase {
            info!(from = from_phase, to = next.phase_name(), "Wizard phase changed");
        } else if next.current_step() != from_step {
            debug!(
                from = from_step.map(Step::number),
                to = next.current_step().map(Step::number),
                "Wizard step changed"
            );
        }
        if let Some(filling) = next.filling() {
            if !filling.errors.is_empty() {
                debug!(
                    errors = filling.errors.len(),
                    steps = ?filling.errors.steps(),
                    "Wizard errors displayed"
                );
            }
        }

        self.state = next;
        actions
    }
}

impl<A: AuthService + ?Sized, D: CameraDevice> Drop for OnboardingWizard<A, D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
