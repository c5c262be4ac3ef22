// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wizard state machine.
//!
//! A pure transition function over an explicit tagged union. Phase-specific
//! data lives inside the variant that needs it, so an OTP challenge can never
//! carry a step error list and a form step can never carry a user id.

use serde::Serialize;

use crate::models::Step;

use super::validation::ValidationResult;

/// Form-entry sub-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillingState {
    pub step: Step,
    /// Displayed error list; empty when nothing is shown.
    pub errors: ValidationResult,
    /// Errors are only recomputed on edit once a submission was attempted.
    pub has_attempted_submission: bool,
}

impl FillingState {
    pub fn at(step: Step) -> Self {
        Self {
            step,
            errors: ValidationResult::new(),
            has_attempted_submission: false,
        }
    }
}

/// Wizard state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum WizardState {
    /// Steps 1-4 are being filled.
    Filling(FillingState),
    /// Account created, waiting for the emailed code.
    OtpPending {
        user_id: String,
        email: String,
        /// Retryable error from the last send/verify attempt.
        error: Option<String>,
    },
    /// Code confirmed; documents are under review. Terminal.
    UnderReview,
}

impl Default for WizardState {
    fn default() -> Self {
        WizardState::Filling(FillingState::at(Step::Business))
    }
}

impl WizardState {
    pub fn phase_name(&self) -> &'static str {
        match self {
            WizardState::Filling(_) => "filling",
            WizardState::OtpPending { .. } => "otp_pending",
            WizardState::UnderReview => "under_review",
        }
    }

    pub fn filling(&self) -> Option<&FillingState> {
        match self {
            WizardState::Filling(filling) => Some(filling),
            _ => None,
        }
    }

    pub fn current_step(&self) -> Option<Step> {
        self.filling().map(|f| f.step)
    }
}

/// Events that drive the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    /// "Continue" button.
    Continue,
    /// "Back" button.
    Back,
    /// A field changed; carries a fresh validation of the whole snapshot.
    FieldEdited { validation: ValidationResult },
    /// "Submit for verification" with the pre-submission validation.
    SubmitRequested { validation: ValidationResult },
    /// The pipeline failed; errors are already step-indexed.
    SubmissionFailed { errors: ValidationResult },
    /// Registration succeeded and an OTP challenge is outstanding.
    OtpChallengeIssued {
        user_id: String,
        email: String,
        notice: Option<String>,
    },
    /// Registration succeeded without a user id; nothing to confirm.
    RegisteredWithoutChallenge,
    /// "Resend code".
    ResendOtp,
    /// Result of a resend attempt.
    OtpResent { error: Option<String> },
    OtpVerified,
    OtpFailed { message: String },
    /// "Wrong email? Change it".
    ChangeEmail,
}

/// Side-effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    /// Back on step 1: hand control to the router.
    LeaveWizard,
    /// Local validation passed; run the submission pipeline.
    SubmitRegistration,
    /// Send (or resend) the OTP for the given user.
    SendOtp { user_id: String },
}

/// Pure wizard state machine.
pub struct WizardStateMachine;

impl WizardStateMachine {
    pub fn transition(state: WizardState, event: WizardEvent) -> (WizardState, Vec<WizardAction>) {
        match (state, event) {
            // Forward navigation is never gated; validation waits for submission.
            (WizardState::Filling(mut filling), WizardEvent::Continue) => {
                if let Some(next) = filling.step.next() {
                    filling.step = next;
                }
                (WizardState::Filling(filling), Vec::new())
            }
            (WizardState::Filling(mut filling), WizardEvent::Back) => {
                match filling.step.previous() {
                    Some(previous) => {
                        filling.step = previous;
                        (WizardState::Filling(filling), Vec::new())
                    }
                    None => (
                        WizardState::Filling(filling),
                        vec![WizardAction::LeaveWizard],
                    ),
                }
            }
            (WizardState::Filling(mut filling), WizardEvent::FieldEdited { validation }) => {
                if filling.has_attempted_submission {
                    filling.errors = validation;
                }
                (WizardState::Filling(filling), Vec::new())
            }
            (WizardState::Filling(filling), WizardEvent::SubmitRequested { validation })
                if filling.step == Step::Selfie =>
            {
                if validation.is_empty() {
                    (
                        WizardState::Filling(FillingState {
                            step: filling.step,
                            errors: validation,
                            has_attempted_submission: true,
                        }),
                        vec![WizardAction::SubmitRegistration],
                    )
                } else {
                    (relocate(filling.step, validation), Vec::new())
                }
            }
            (WizardState::Filling(filling), WizardEvent::SubmissionFailed { errors }) => {
                (relocate(filling.step, errors), Vec::new())
            }
            (
                WizardState::Filling(_),
                WizardEvent::OtpChallengeIssued {
                    user_id,
                    email,
                    notice,
                },
            ) => (
                WizardState::OtpPending {
                    user_id,
                    email,
                    error: notice,
                },
                Vec::new(),
            ),
            (WizardState::Filling(_), WizardEvent::RegisteredWithoutChallenge) => {
                (WizardState::UnderReview, Vec::new())
            }
            (WizardState::OtpPending { user_id, email, .. }, WizardEvent::ResendOtp) => (
                WizardState::OtpPending {
                    user_id: user_id.clone(),
                    email,
                    error: None,
                },
                vec![WizardAction::SendOtp { user_id }],
            ),
            (WizardState::OtpPending { user_id, email, .. }, WizardEvent::OtpResent { error }) => {
                (
                    WizardState::OtpPending {
                        user_id,
                        email,
                        error,
                    },
                    Vec::new(),
                )
            }
            (WizardState::OtpPending { .. }, WizardEvent::OtpVerified) => {
                (WizardState::UnderReview, Vec::new())
            }
            (WizardState::OtpPending { user_id, email, .. }, WizardEvent::OtpFailed { message }) => (
                WizardState::OtpPending {
                    user_id,
                    email,
                    error: Some(message),
                },
                Vec::new(),
            ),
            (WizardState::OtpPending { .. }, WizardEvent::ChangeEmail) => (
                WizardState::Filling(FillingState {
                    step: Step::Credentials,
                    errors: ValidationResult::new(),
                    has_attempted_submission: true,
                }),
                Vec::new(),
            ),
            (state, _event) => (state, Vec::new()),
        }
    }
}

/// Move to the lowest implicated step; unattributed errors keep the cursor.
fn relocate(current: Step, errors: ValidationResult) -> WizardState {
    let step = errors.first_step().unwrap_or(current);
    WizardState::Filling(FillingState {
        step,
        errors,
        has_attempted_submission: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::validation::ValidationIssue;

    fn filling(step: Step) -> WizardState {
        WizardState::Filling(FillingState::at(step))
    }

    fn errors(issues: &[(Option<Step>, &str)]) -> ValidationResult {
        issues
            .iter()
            .map(|(step, msg)| ValidationIssue::for_step(*step, *msg))
            .collect()
    }

    fn otp_pending() -> WizardState {
        WizardState::OtpPending {
            user_id: "u1".into(),
            email: "a@b.dz".into(),
            error: None,
        }
    }

    #[test]
    fn initial_state_is_step_one() {
        assert_eq!(WizardState::default(), filling(Step::Business));
    }

    #[test]
    fn continue_is_not_gated_and_stops_at_four() {
        let (state, actions) = WizardStateMachine::transition(filling(Step::Business), WizardEvent::Continue);
        assert_eq!(state, filling(Step::Credentials));
        assert!(actions.is_empty());

        let (state, _) = WizardStateMachine::transition(filling(Step::Selfie), WizardEvent::Continue);
        assert_eq!(state, filling(Step::Selfie));
    }

    #[test]
    fn back_on_step_one_leaves_the_wizard() {
        let (state, actions) = WizardStateMachine::transition(filling(Step::Business), WizardEvent::Back);
        assert_eq!(state, filling(Step::Business));
        assert_eq!(actions, vec![WizardAction::LeaveWizard]);

        let (state, actions) = WizardStateMachine::transition(filling(Step::Documents), WizardEvent::Back);
        assert_eq!(state, filling(Step::Credentials));
        assert!(actions.is_empty());
    }

    #[test]
    fn failed_local_validation_relocates_to_lowest_step() {
        let validation = errors(&[
            (Some(Step::Documents), "Import license is required"),
            (Some(Step::Credentials), "Password is required"),
        ]);
        let (state, actions) = WizardStateMachine::transition(
            filling(Step::Selfie),
            WizardEvent::SubmitRequested {
                validation: validation.clone(),
            },
        );
        assert!(actions.is_empty());
        let filling = state.filling().unwrap();
        assert_eq!(filling.step, Step::Credentials);
        assert_eq!(filling.errors, validation);
        assert!(filling.has_attempted_submission);
    }

    #[test]
    fn clean_validation_requests_registration() {
        let (state, actions) = WizardStateMachine::transition(
            filling(Step::Selfie),
            WizardEvent::SubmitRequested {
                validation: ValidationResult::new(),
            },
        );
        assert_eq!(actions, vec![WizardAction::SubmitRegistration]);
        let filling = state.filling().unwrap();
        assert_eq!(filling.step, Step::Selfie);
        assert!(filling.errors.is_empty());
    }

    #[test]
    fn submit_is_ignored_before_the_last_step() {
        let (state, actions) = WizardStateMachine::transition(
            filling(Step::Documents),
            WizardEvent::SubmitRequested {
                validation: ValidationResult::new(),
            },
        );
        assert_eq!(state, filling(Step::Documents));
        assert!(actions.is_empty());
    }

    #[test]
    fn errors_persist_across_navigation() {
        let (state, _) = WizardStateMachine::transition(
            filling(Step::Selfie),
            WizardEvent::SubmitRequested {
                validation: errors(&[(Some(Step::Business), "NIN is required")]),
            },
        );
        let (state, _) = WizardStateMachine::transition(state, WizardEvent::Continue);
        let (state, _) = WizardStateMachine::transition(state, WizardEvent::Continue);
        let filling = state.filling().unwrap();
        assert_eq!(filling.step, Step::Documents);
        assert_eq!(filling.errors.len(), 1);
    }

    #[test]
    fn edits_revalidate_only_after_an_attempt() {
        let pending = errors(&[(Some(Step::Business), "NIN is required")]);
        let (state, _) = WizardStateMachine::transition(
            filling(Step::Business),
            WizardEvent::FieldEdited {
                validation: pending.clone(),
            },
        );
        assert!(state.filling().unwrap().errors.is_empty());

        let (state, _) = WizardStateMachine::transition(
            filling(Step::Selfie),
            WizardEvent::SubmitRequested { validation: pending },
        );
        let (state, _) = WizardStateMachine::transition(
            state,
            WizardEvent::FieldEdited {
                validation: ValidationResult::new(),
            },
        );
        let filling = state.filling().unwrap();
        assert!(filling.errors.is_empty());
        assert_eq!(filling.step, Step::Business);
    }

    #[test]
    fn unattributed_server_errors_keep_the_cursor() {
        let (state, _) = WizardStateMachine::transition(
            filling(Step::Selfie),
            WizardEvent::SubmissionFailed {
                errors: errors(&[(None, "Network error, please try again")]),
            },
        );
        let filling = state.filling().unwrap();
        assert_eq!(filling.step, Step::Selfie);
        assert_eq!(filling.errors.len(), 1);
    }

    #[test]
    fn otp_flow_reaches_review_and_stays_there() {
        let (state, _) = WizardStateMachine::transition(
            filling(Step::Selfie),
            WizardEvent::OtpChallengeIssued {
                user_id: "u1".into(),
                email: "a@b.dz".into(),
                notice: None,
            },
        );
        assert_eq!(state, otp_pending());

        let (state, _) = WizardStateMachine::transition(
            state,
            WizardEvent::OtpFailed {
                message: "Invalid code".into(),
            },
        );
        assert_eq!(state.phase_name(), "otp_pending");

        let (state, _) = WizardStateMachine::transition(state, WizardEvent::OtpVerified);
        assert_eq!(state, WizardState::UnderReview);

        for event in [WizardEvent::Back, WizardEvent::ChangeEmail, WizardEvent::Continue] {
            let (next, actions) = WizardStateMachine::transition(state.clone(), event);
            assert_eq!(next, WizardState::UnderReview);
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn change_email_returns_to_credentials() {
        let (state, _) = WizardStateMachine::transition(otp_pending(), WizardEvent::ChangeEmail);
        let filling = state.filling().unwrap();
        assert_eq!(filling.step, Step::Credentials);
        assert!(filling.errors.is_empty());
    }

    #[test]
    fn resend_requests_otp_without_phase_change() {
        let (state, actions) = WizardStateMachine::transition(otp_pending(), WizardEvent::ResendOtp);
        assert_eq!(state, otp_pending());
        assert_eq!(
            actions,
            vec![WizardAction::SendOtp {
                user_id: "u1".into()
            }]
        );
    }

    #[test]
    fn registration_without_user_id_goes_straight_to_review() {
        let (state, _) = WizardStateMachine::transition(
            filling(Step::Selfie),
            WizardEvent::RegisteredWithoutChallenge,
        );
        assert_eq!(state, WizardState::UnderReview);
    }
}
