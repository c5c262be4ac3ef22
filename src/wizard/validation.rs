// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side validation and step completeness.
//!
//! [`validate`] is pure and never short-circuits: every violated rule adds
//! one issue, in a fixed discovery order. [`is_step_complete`] is recomputed
//! from scratch on every call and never consults a previous run.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{
    phone_digits, Field, Step, WizardSnapshot, NIN_LENGTH, PHONE_DIGITS, PHONE_PREFIX,
};

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// One displayable error, optionally attributed to the step that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
    /// `None` for messages that could not be attributed to any step.
    pub step: Option<Step>,
}

impl ValidationIssue {
    pub fn for_field(field: Field, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            step: Some(field.step()),
        }
    }

    pub fn for_step(step: Option<Step>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            step,
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::for_step(None, message)
    }
}

/// Ordered error messages plus the deduplicated set of implicated steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Messages in discovery order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|i| i.message.as_str())
    }

    /// Implicated steps, deduplicated.
    pub fn steps(&self) -> BTreeSet<Step> {
        self.issues.iter().filter_map(|i| i.step).collect()
    }

    pub fn implicates(&self, step: Step) -> bool {
        self.issues.iter().any(|i| i.step == Some(step))
    }

    /// Lowest-numbered implicated step, the relocation target.
    pub fn first_step(&self) -> Option<Step> {
        self.issues.iter().filter_map(|i| i.step).min()
    }
}

impl FromIterator<ValidationIssue> for ValidationResult {
    fn from_iter<T: IntoIterator<Item = ValidationIssue>>(iter: T) -> Self {
        Self {
            issues: iter.into_iter().collect(),
        }
    }
}

/// Validate the whole snapshot.
pub fn validate(snapshot: &WizardSnapshot, selfie_present: bool) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut fail = |field: Field, message: &str| {
        result.push(ValidationIssue::for_field(field, message));
    };

    // Step 1
    if is_blank(&snapshot.business_name) {
        fail(Field::BusinessName, "Business name is required");
    }
    if is_blank(&snapshot.owner_full_name) {
        fail(Field::OwnerFullName, "Owner full name is required");
    }
    if is_blank(&snapshot.commerce_number) {
        fail(Field::CommerceNumber, "Register commerce number is required");
    }
    let nin = snapshot.nin.trim();
    if nin.is_empty() {
        fail(Field::Nin, "NIN is required");
    } else if nin.len() != NIN_LENGTH || !nin.chars().all(|c| c.is_ascii_digit()) {
        fail(Field::Nin, "NIN must be exactly 18 digits");
    }

    // Step 2
    let email = snapshot.email.trim();
    if email.is_empty() {
        fail(Field::Email, "Email is required");
    } else if !EMAIL_SHAPE.is_match(email) {
        fail(Field::Email, "Email address is not valid");
    }
    let digits = phone_digits(&snapshot.phone, PHONE_PREFIX);
    if digits.is_empty() {
        fail(Field::Phone, "Phone number is required");
    } else if digits.len() != PHONE_DIGITS {
        fail(
            Field::Phone,
            "Phone number must have exactly 9 digits after +213",
        );
    }
    if snapshot.password.is_empty() {
        fail(Field::Password, "Password is required");
    }
    if snapshot.confirm_password != snapshot.password {
        fail(Field::ConfirmPassword, "Passwords do not match");
    }

    // Step 3 (the back of the ID card is optional)
    if snapshot.id_front.is_none() {
        fail(Field::IdFront, "ID card front image is required");
    }
    if snapshot.import_license.is_none() {
        fail(Field::ImportLicense, "Import license is required");
    }
    if snapshot.commercial_register.is_none() {
        fail(Field::CommercialRegister, "Commercial register is required");
    }

    // Step 4
    if !selfie_present {
        fail(Field::Selfie, "Selfie photo is required");
    }

    result
}

/// A step is complete when it owns no error and all its required fields are
/// filled. Used for progress badges only, never for navigation.
pub fn is_step_complete(step: Step, snapshot: &WizardSnapshot, selfie_present: bool) -> bool {
    let fields_filled = step
        .fields()
        .iter()
        .filter(|f| f.is_required())
        .all(|f| snapshot.is_filled(*f, selfie_present));

    fields_filled && !validate(snapshot, selfie_present).implicates(step)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
