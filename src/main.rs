// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Demo driver for the onboarding wizard.
//!
//! ```text
//! importer-onboarding <form.json> <selfie-image>
//! ```
//!
//! Fills the wizard from a JSON form file, attaches the listed documents,
//! "captures" the selfie from a still image, submits, then prompts on stdin
//! for the emailed code (`resend` sends it again, `quit` aborts).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use importer_onboarding::auth::HttpAuthService;
use importer_onboarding::capture::StillImageCamera;
use importer_onboarding::config::ClientConfig;
use importer_onboarding::models::{Artifact, Field, Step};
use importer_onboarding::telemetry;
use importer_onboarding::wizard::{OnboardingWizard, WizardState};
use importer_onboarding::OnboardingError;

const MAX_OTP_ATTEMPTS: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "importer-onboarding")]
#[command(about = "Register an importer account from a form file", long_about = None)]
struct Args {
    /// JSON form file with business details, credentials and document paths
    form: PathBuf,

    /// Image file served as the selfie camera frame
    selfie: PathBuf,
}

/// Form file contents. Document entries are file paths.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FormFile {
    business_name: String,
    owner_full_name: String,
    commerce_number: String,
    nin: String,
    license_id: String,
    wilaya: String,
    address: String,
    email: String,
    phone: String,
    password: String,
    confirm_password: String,
    import_license: Option<PathBuf>,
    commercial_register: Option<PathBuf>,
    id_front: Option<PathBuf>,
    id_back: Option<PathBuf>,
}

impl FormFile {
    fn text_fields(&self) -> [(Field, &str); 11] {
        [
            (Field::BusinessName, self.business_name.as_str()),
            (Field::OwnerFullName, self.owner_full_name.as_str()),
            (Field::CommerceNumber, self.commerce_number.as_str()),
            (Field::Nin, self.nin.as_str()),
            (Field::LicenseId, self.license_id.as_str()),
            (Field::Wilaya, self.wilaya.as_str()),
            (Field::Address, self.address.as_str()),
            (Field::Email, self.email.as_str()),
            (Field::Phone, self.phone.as_str()),
            (Field::Password, self.password.as_str()),
            (Field::ConfirmPassword, self.confirm_password.as_str()),
        ]
    }

    fn documents(&self) -> [(Field, Option<&Path>); 4] {
        [
            (Field::ImportLicense, self.import_license.as_deref()),
            (Field::CommercialRegister, self.commercial_register.as_deref()),
            (Field::IdFront, self.id_front.as_deref()),
            (Field::IdBack, self.id_back.as_deref()),
        ]
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(config.log_format);

    match run(config, args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Onboarding failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ClientConfig, args: Args) -> Result<(), OnboardingError> {
    let form = read_form(&args.form).await?;

    let auth = Arc::new(HttpAuthService::new(&config)?);
    info!(base_url = auth.base_url(), "Starting importer onboarding");
    let mut wizard = OnboardingWizard::new(auth, StillImageCamera::new(args.selfie));

    for (field, value) in form.text_fields() {
        wizard.set_text(field, value);
    }
    for (field, path) in form.documents() {
        if let Some(path) = path {
            wizard.set_document(field, Some(Artifact::from_path(path)?));
        }
    }
    while wizard.current_step().is_some_and(|step| step < Step::Selfie) {
        wizard.next_step();
    }

    wizard.start_camera()?;
    wizard.take_photo()?;

    match wizard.submit().await {
        WizardState::Filling(filling) => {
            return Err(OnboardingError::Incomplete(
                filling.errors.messages().map(str::to_string).collect(),
            ));
        }
        WizardState::UnderReview => {
            println!("Registration received. Your documents are under review.");
            return Ok(());
        }
        WizardState::OtpPending { email, error, .. } => {
            println!("A 6-digit code was sent to {email}.");
            if let Some(notice) = error {
                println!("{notice}");
            }
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    for _ in 0..MAX_OTP_ATTEMPTS {
        println!("Enter code (or \"resend\" / \"quit\"):");
        let Some(line) = lines.next_line().await.map_err(|source| OnboardingError::Read {
            path: PathBuf::from("<stdin>"),
            source,
        })?
        else {
            break;
        };

        let state = match line.trim() {
            "quit" => break,
            "resend" => wizard.resend_otp().await,
            code => wizard.verify_otp(code).await,
        };
        match state {
            WizardState::UnderReview => {
                println!("Email confirmed. Your documents are under review.");
                return Ok(());
            }
            WizardState::OtpPending {
                error: Some(message),
                ..
            } => println!("{message}"),
            _ => {}
        }
    }

    wizard.teardown();
    Err(OnboardingError::Unconfirmed)
}

async fn read_form(path: &Path) -> Result<FormFile, OnboardingError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| OnboardingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|e| OnboardingError::FormFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
