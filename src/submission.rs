// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Submission Pipeline
//!
//! Turns a validated [`WizardSnapshot`] into a registration request and
//! drives the two-phase protocol with the Auth Service:
//!
//! 1. Validate locally; stop without any network call on errors
//! 2. Normalise the phone number and decode the selfie
//! 3. `registerImportator` with the multipart payload
//! 4. `sendOtp` for the returned user id, or finish if there is none
//!
//! OTP verification and resend are separate calls on the same pipeline.
//! Only one call per pipeline is in flight at a time; a second caller gets
//! [`SubmissionError::Busy`] / [`OtpError::Busy`] until the first returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{info, warn};

use crate::auth::payload::{
    ID_CARD_IMAGE, LICENSE_IMAGE, PROFILE_ADDRESS, PROFILE_LICENSE_ID, PROFILE_NIN,
    PROFILE_REGISTER_COMMERCE_NUMBER, PROFILE_WILAYA, REGISTER_COMMERCE_IMAGE, SELFIE_IMAGE,
    USER_EMAIL, USER_FULL_NAME, USER_PASSWORD, USER_PHONE_NUMBER,
};
use crate::auth::{AuthService, AuthServiceError, RegistrationPayload};
use crate::models::{normalize_phone, Artifact, Field, SelfieImage, WizardSnapshot, PHONE_PREFIX};
use crate::wizard::server_errors::route_server_messages;
use crate::wizard::validation::{validate, ValidationIssue, ValidationResult};

pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";
pub const SERVER_ERROR_MESSAGE: &str = "Something went wrong on our side. Please try again later.";
pub const SELFIE_DECODE_MESSAGE: &str = "Selfie photo could not be processed. Please retake it.";
pub const BUSY_MESSAGE: &str = "A request is already in progress. Please wait.";
pub const OTP_FORMAT_MESSAGE: &str = "Enter the 6-digit code sent to your email.";
pub const OTP_REJECTED_MESSAGE: &str = "Invalid or expired code. Please try again.";
pub const OTP_SEND_FAILED_NOTICE: &str =
    "We could not send the verification code. Use \"Resend code\" to try again.";

const OTP_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("a submission is already in progress")]
    Busy,

    #[error("form has {} validation error(s)", .0.len())]
    Validation(ValidationResult),

    #[error("selfie could not be decoded: {0}")]
    Decode(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("registration rejected: {}", .0.join("; "))]
    ServerValidation(Vec<String>),

    #[error("server error ({status:?}): {message}")]
    Server { status: Option<u16>, message: String },
}

impl SubmissionError {
    /// Step-indexed error list for display.
    pub fn into_validation(self) -> ValidationResult {
        match self {
            SubmissionError::Busy => [ValidationIssue::general(BUSY_MESSAGE)].into_iter().collect(),
            SubmissionError::Validation(result) => result,
            SubmissionError::Decode(_) => [ValidationIssue::for_field(Field::Selfie, SELFIE_DECODE_MESSAGE)]
                .into_iter()
                .collect(),
            SubmissionError::Network(_) => [ValidationIssue::general(NETWORK_ERROR_MESSAGE)]
                .into_iter()
                .collect(),
            SubmissionError::ServerValidation(messages) => route_server_messages(&messages),
            SubmissionError::Server { .. } => [ValidationIssue::general(SERVER_ERROR_MESSAGE)]
                .into_iter()
                .collect(),
        }
    }
}

impl From<AuthServiceError> for SubmissionError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::Connectivity(reason) => SubmissionError::Network(reason),
            AuthServiceError::Status { status, messages }
                if (400..500).contains(&status) && !messages.is_empty() =>
            {
                SubmissionError::ServerValidation(messages)
            }
            other => SubmissionError::Server {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("verification code must be 6 digits")]
    InvalidFormat,

    #[error("an OTP request is already in progress")]
    Busy,

    /// Retryable; the message is meant for display.
    #[error("{0}")]
    Rejected(String),
}

impl OtpError {
    pub fn user_message(&self) -> String {
        match self {
            OtpError::InvalidFormat => OTP_FORMAT_MESSAGE.to_string(),
            OtpError::Busy => BUSY_MESSAGE.to_string(),
            OtpError::Rejected(message) => message.clone(),
        }
    }

    fn from_auth(err: AuthServiceError, rejected_fallback: &str) -> Self {
        let message = match &err {
            AuthServiceError::Connectivity(_) => NETWORK_ERROR_MESSAGE,
            e if e.is_client_error() => e.first_message_or(rejected_fallback),
            _ => SERVER_ERROR_MESSAGE,
        };
        OtpError::Rejected(message.to_string())
    }
}

/// Result of a successful registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Account created; an OTP challenge is outstanding.
    OtpRequired {
        user_id: String,
        /// Set when the account exists but the code could not be sent.
        otp_notice: Option<String>,
    },
    /// No user id came back; the account needs no OTP confirmation.
    AlreadyVerified,
}

/// Clears the busy flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Registration and OTP calls against an [`AuthService`].
pub struct SubmissionPipeline<A: ?Sized> {
    auth: Arc<A>,
    busy: AtomicBool,
}

impl<A: AuthService + ?Sized> SubmissionPipeline<A> {
    pub fn new(auth: Arc<A>) -> Self {
        Self {
            auth,
            busy: AtomicBool::new(false),
        }
    }

    pub fn auth(&self) -> &Arc<A> {
        &self.auth
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    /// Validate, register, and request the OTP.
    ///
    /// The snapshot's phone field is rewritten to its normalised form before
    /// transfer.
    pub async fn submit(
        &self,
        snapshot: &mut WizardSnapshot,
    ) -> Result<RegistrationOutcome, SubmissionError> {
        let _guard = self.try_begin().ok_or(SubmissionError::Busy)?;

        let validation = validate(snapshot, snapshot.selfie.is_some());
        if !validation.is_empty() {
            info!(errors = validation.len(), "Submission blocked by local validation");
            return Err(SubmissionError::Validation(validation));
        }

        snapshot.phone = normalize_phone(&snapshot.phone, PHONE_PREFIX);
        let payload = build_payload(snapshot)?;

        info!("Submitting importer registration");
        let response = self.auth.register_importator(payload).await.map_err(|e| {
            warn!(error = %e, "Importer registration failed");
            SubmissionError::from(e)
        })?;

        let Some(user_id) = response.user_id else {
            info!("Registration returned no user id; skipping OTP");
            return Ok(RegistrationOutcome::AlreadyVerified);
        };

        let otp_notice = match self.auth.send_otp(&user_id).await {
            Ok(()) => {
                info!(user_id = %user_id, "Registration complete, OTP sent");
                None
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "OTP could not be sent after registration");
                Some(OTP_SEND_FAILED_NOTICE.to_string())
            }
        };

        Ok(RegistrationOutcome::OtpRequired {
            user_id,
            otp_notice,
        })
    }

    /// Confirm the account with the emailed code.
    pub async fn verify_otp(&self, user_id: &str, code: &str) -> Result<(), OtpError> {
        let code = code.trim();
        if code.len() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(OtpError::InvalidFormat);
        }
        let _guard = self.try_begin().ok_or(OtpError::Busy)?;

        match self.auth.verify_otp(user_id, code).await {
            Ok(()) => {
                info!(user_id = %user_id, "OTP verified");
                Ok(())
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "OTP verification failed");
                Err(OtpError::from_auth(e, OTP_REJECTED_MESSAGE))
            }
        }
    }

    /// Send the code again. No state changes.
    pub async fn resend_otp(&self, user_id: &str) -> Result<(), OtpError> {
        let _guard = self.try_begin().ok_or(OtpError::Busy)?;

        self.auth.send_otp(user_id).await.map_err(|e| {
            warn!(user_id = %user_id, error = %e, "OTP resend failed");
            OtpError::from_auth(e, OTP_SEND_FAILED_NOTICE)
        })?;
        info!(user_id = %user_id, "OTP resent");
        Ok(())
    }
}

/// Assemble the multipart payload from a validated snapshot.
pub fn build_payload(snapshot: &WizardSnapshot) -> Result<RegistrationPayload, SubmissionError> {
    let selfie = snapshot
        .selfie
        .as_ref()
        .ok_or_else(|| SubmissionError::Decode("no selfie captured".to_string()))?;
    let selfie = decode_selfie(selfie)?;

    let mut payload = RegistrationPayload::new()
        .text(USER_FULL_NAME, snapshot.owner_full_name.trim())
        .text(USER_EMAIL, snapshot.email.trim())
        .text(USER_PHONE_NUMBER, normalize_phone(&snapshot.phone, PHONE_PREFIX))
        .text(USER_PASSWORD, snapshot.password.as_str())
        .text(PROFILE_LICENSE_ID, snapshot.license_id.trim())
        .text(PROFILE_REGISTER_COMMERCE_NUMBER, snapshot.commerce_number.trim())
        .text(PROFILE_NIN, snapshot.nin.trim())
        .text(PROFILE_WILAYA, snapshot.wilaya.trim())
        .text(PROFILE_ADDRESS, snapshot.address.trim());

    for (name, artifact) in [
        (REGISTER_COMMERCE_IMAGE, &snapshot.commercial_register),
        (LICENSE_IMAGE, &snapshot.import_license),
        (ID_CARD_IMAGE, &snapshot.id_front),
    ] {
        if let Some(artifact) = artifact {
            payload = payload.file(name, artifact.clone());
        }
    }

    Ok(payload.file(SELFIE_IMAGE, selfie))
}

/// Decode a `data:image/...;base64,` selfie into a binary part.
pub fn decode_selfie(selfie: &SelfieImage) -> Result<Artifact, SubmissionError> {
    let (header, encoded) = selfie
        .data_url()
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| SubmissionError::Decode("not a data URL".to_string()))?;

    let mime_type = header
        .strip_suffix(";base64")
        .filter(|mime| mime.starts_with("image/"))
        .ok_or_else(|| SubmissionError::Decode(format!("unsupported encoding {header:?}")))?;

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SubmissionError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(SubmissionError::Decode("empty image".to_string()));
    }

    let extension = match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "img",
    };
    Ok(Artifact::new(format!("selfie.{extension}"), mime_type, bytes))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{LoginResponse, RegistrationResponse};
    use crate::models::{Step, SelfieImage};
    use crate::wizard::validation::tests::complete_snapshot;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Scriptable Auth Service.
    #[derive(Default)]
    pub(crate) struct FakeAuth {
        pub register_result: Mutex<Option<Result<Value, AuthServiceError>>>,
        pub send_otp_error: Mutex<Option<AuthServiceError>>,
        pub verify_error: Mutex<Option<AuthServiceError>>,
        pub payloads: Mutex<Vec<RegistrationPayload>>,
        pub sent_otps: Mutex<Vec<String>>,
        pub verified: Mutex<Vec<(String, String)>>,
        pub gate: Option<Arc<Notify>>,
    }

    impl FakeAuth {
        pub fn registering(user_id: &str) -> Self {
            let auth = Self::default();
            *auth.register_result.lock().unwrap() = Some(Ok(json!({
                "importatorProfile": { "user": { "userId": user_id } }
            })));
            auth
        }

        pub fn failing(err: AuthServiceError) -> Self {
            let auth = Self::default();
            *auth.register_result.lock().unwrap() = Some(Err(err));
            auth
        }

        pub fn register_calls(&self) -> usize {
            self.payloads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AuthService for FakeAuth {
        async fn login(&self, _email: &str, _password: &str) -> Result<LoginResponse, AuthServiceError> {
            Ok(LoginResponse::default())
        }

        async fn register_importator(
            &self,
            payload: RegistrationPayload,
        ) -> Result<RegistrationResponse, AuthServiceError> {
            self.payloads.lock().unwrap().push(payload);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let result = self
                .register_result
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(json!({})));
            result.map(RegistrationResponse::from_value)
        }

        async fn send_otp(&self, user_id: &str) -> Result<(), AuthServiceError> {
            self.sent_otps.lock().unwrap().push(user_id.to_string());
            match self.send_otp_error.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn verify_otp(&self, user_id: &str, code: &str) -> Result<(), AuthServiceError> {
            self.verified
                .lock()
                .unwrap()
                .push((user_id.to_string(), code.to_string()));
            match self.verify_error.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn forgot_password(&self, _email: &str) -> Result<(), AuthServiceError> {
            Ok(())
        }

        async fn reset_password(
            &self,
            _email: &str,
            _otp: &str,
            _new_password: &str,
        ) -> Result<(), AuthServiceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn invalid_snapshot_never_reaches_the_backend() {
        let auth = Arc::new(FakeAuth::registering("u1"));
        let pipeline = SubmissionPipeline::new(auth.clone());
        let mut snapshot = complete_snapshot();
        snapshot.selfie = None;

        let err = pipeline.submit(&mut snapshot).await.unwrap_err();
        let SubmissionError::Validation(result) = err else {
            panic!("expected validation error");
        };
        assert_eq!(result.first_step(), Some(Step::Selfie));
        assert_eq!(auth.register_calls(), 0);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn successful_submission_sends_otp() {
        let auth = Arc::new(FakeAuth::registering("u1"));
        let pipeline = SubmissionPipeline::new(auth.clone());
        let mut snapshot = complete_snapshot();

        let outcome = pipeline.submit(&mut snapshot).await.unwrap();
        assert_eq!(
            outcome,
            RegistrationOutcome::OtpRequired {
                user_id: "u1".into(),
                otp_notice: None
            }
        );
        assert_eq!(*auth.sent_otps.lock().unwrap(), vec!["u1".to_string()]);
        assert_eq!(snapshot.phone, "+213612345678");
    }

    #[tokio::test]
    async fn payload_uses_contract_field_names() {
        let auth = Arc::new(FakeAuth::registering("u1"));
        let pipeline = SubmissionPipeline::new(auth.clone());
        pipeline.submit(&mut complete_snapshot()).await.unwrap();

        let payloads = auth.payloads.lock().unwrap();
        let payload = &payloads[0];
        assert_eq!(
            payload.field_names().collect::<Vec<_>>(),
            vec![
                "user[fullName]",
                "user[email]",
                "user[phoneNumber]",
                "user[password]",
                "profile[licenseId]",
                "profile[registerCommerceNumber]",
                "profile[NIN]",
                "profile[wilaya]",
                "profile[adress]",
            ]
        );
        assert_eq!(
            payload.file_names().collect::<Vec<_>>(),
            vec![
                "registerCommerceImage",
                "licenseImage",
                "idCardImage",
                "selfieImage"
            ]
        );
        assert_eq!(payload.field(USER_PHONE_NUMBER), Some("+213612345678"));
        assert_eq!(payload.field(USER_FULL_NAME), Some("Amina Benali"));
        assert_eq!(payload.field(PROFILE_NIN), Some("123456789012345678"));

        let selfie = payload.attachment(SELFIE_IMAGE).unwrap();
        assert_eq!(selfie.mime_type(), "image/jpeg");
        assert_eq!(selfie.data(), &[0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn missing_user_id_skips_otp() {
        let auth = Arc::new(FakeAuth::default());
        *auth.register_result.lock().unwrap() = Some(Ok(json!({ "message": "ok" })));
        let pipeline = SubmissionPipeline::new(auth.clone());

        let outcome = pipeline.submit(&mut complete_snapshot()).await.unwrap();
        assert_eq!(outcome, RegistrationOutcome::AlreadyVerified);
        assert!(auth.sent_otps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn otp_send_failure_still_reports_account() {
        let auth = Arc::new(FakeAuth::registering("u1"));
        *auth.send_otp_error.lock().unwrap() = Some(AuthServiceError::Connectivity("down".into()));
        let pipeline = SubmissionPipeline::new(auth);

        let outcome = pipeline.submit(&mut complete_snapshot()).await.unwrap();
        assert_eq!(
            outcome,
            RegistrationOutcome::OtpRequired {
                user_id: "u1".into(),
                otp_notice: Some(OTP_SEND_FAILED_NOTICE.to_string())
            }
        );
    }

    #[tokio::test]
    async fn failures_are_classified_by_status() {
        let cases = [
            (
                AuthServiceError::Connectivity("refused".into()),
                SubmissionError::Network("refused".into()),
            ),
            (
                AuthServiceError::Status {
                    status: 400,
                    messages: vec!["user.email must be an email".into()],
                },
                SubmissionError::ServerValidation(vec!["user.email must be an email".into()]),
            ),
        ];
        for (auth_err, expected) in cases {
            let pipeline = SubmissionPipeline::new(Arc::new(FakeAuth::failing(auth_err)));
            let err = pipeline.submit(&mut complete_snapshot()).await.unwrap_err();
            assert_eq!(err, expected);
        }

        let pipeline = SubmissionPipeline::new(Arc::new(FakeAuth::failing(
            AuthServiceError::Status {
                status: 503,
                messages: vec![],
            },
        )));
        let err = pipeline.submit(&mut complete_snapshot()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Server { status: Some(503), .. }));
    }

    #[test]
    fn errors_convert_to_step_indexed_lists() {
        let routed = SubmissionError::ServerValidation(vec![
            "selfieImage should not be empty".into(),
            "user.password is too weak".into(),
        ])
        .into_validation();
        assert_eq!(routed.first_step(), Some(Step::Credentials));
        assert_eq!(
            routed.messages().collect::<Vec<_>>(),
            vec!["Selfie image should not be empty", "Password is too weak"]
        );

        let network = SubmissionError::Network("x".into()).into_validation();
        assert_eq!(network.messages().collect::<Vec<_>>(), vec![NETWORK_ERROR_MESSAGE]);
        assert_eq!(network.first_step(), None);

        let decode = SubmissionError::Decode("bad".into()).into_validation();
        assert_eq!(decode.first_step(), Some(Step::Selfie));
    }

    #[tokio::test]
    async fn undecodable_selfie_is_a_decode_error() {
        let auth = Arc::new(FakeAuth::registering("u1"));
        let pipeline = SubmissionPipeline::new(auth.clone());
        let mut snapshot = complete_snapshot();
        snapshot.selfie = Some(SelfieImage::from_data_url("data:image/jpeg;base64,@@@"));

        let err = pipeline.submit(&mut snapshot).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Decode(_)));
        assert_eq!(auth.register_calls(), 0);
    }

    #[test]
    fn decode_selfie_rejects_non_image_urls() {
        for url in [
            "not-a-data-url",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png,rawdata",
            "data:image/png;base64,",
        ] {
            assert!(
                decode_selfie(&SelfieImage::from_data_url(url)).is_err(),
                "{url}"
            );
        }
        let png = decode_selfie(&SelfieImage::from_data_url("data:image/png;base64,iVBORw0=")).unwrap();
        assert_eq!(png.file_name(), "selfie.png");
    }

    #[tokio::test]
    async fn concurrent_submission_is_rejected_while_busy() {
        let gate = Arc::new(Notify::new());
        let mut fake = FakeAuth::registering("u1");
        fake.gate = Some(gate.clone());
        let auth = Arc::new(fake);
        let pipeline = Arc::new(SubmissionPipeline::new(auth.clone()));

        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit(&mut complete_snapshot()).await })
        };
        while auth.register_calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(pipeline.is_busy());
        let second = pipeline.submit(&mut complete_snapshot()).await;
        assert_eq!(second, Err(SubmissionError::Busy));
        assert_eq!(pipeline.verify_otp("u1", "123456").await, Err(OtpError::Busy));

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!pipeline.is_busy());
        assert_eq!(auth.register_calls(), 1);
    }

    #[tokio::test]
    async fn verify_otp_checks_format_locally() {
        let auth = Arc::new(FakeAuth::default());
        let pipeline = SubmissionPipeline::new(auth.clone());
        for code in ["", "12345", "1234567", "12a456"] {
            assert_eq!(pipeline.verify_otp("u1", code).await, Err(OtpError::InvalidFormat));
        }
        assert!(auth.verified.lock().unwrap().is_empty());

        pipeline.verify_otp("u1", " 123456 ").await.unwrap();
        assert_eq!(
            *auth.verified.lock().unwrap(),
            vec![("u1".to_string(), "123456".to_string())]
        );
    }

    #[tokio::test]
    async fn rejected_otp_is_retryable() {
        let auth = Arc::new(FakeAuth::default());
        *auth.verify_error.lock().unwrap() = Some(AuthServiceError::Status {
            status: 400,
            messages: vec!["Invalid OTP code".into()],
        });
        let pipeline = SubmissionPipeline::new(auth.clone());

        let err = pipeline.verify_otp("u1", "000000").await.unwrap_err();
        assert_eq!(err, OtpError::Rejected("Invalid OTP code".into()));

        *auth.verify_error.lock().unwrap() = None;
        pipeline.verify_otp("u1", "123456").await.unwrap();
    }

    #[tokio::test]
    async fn resend_reinvokes_send_otp() {
        let auth = Arc::new(FakeAuth::default());
        let pipeline = SubmissionPipeline::new(auth.clone());
        pipeline.resend_otp("u1").await.unwrap();
        pipeline.resend_otp("u1").await.unwrap();
        assert_eq!(auth.sent_otps.lock().unwrap().len(), 2);

        *auth.send_otp_error.lock().unwrap() = Some(AuthServiceError::Connectivity("down".into()));
        assert_eq!(
            pipeline.resend_otp("u1").await,
            Err(OtpError::Rejected(NETWORK_ERROR_MESSAGE.to_string()))
        );
    }
}
