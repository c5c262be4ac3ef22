// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wizard Data Models
//!
//! This module defines the single mutable aggregate of the onboarding flow,
//! [`WizardSnapshot`], together with the static field ownership map that
//! binds every field to the [`Step`] responsible for it.
//!
//! ## Step Ownership
//!
//! | Step | Label | Fields |
//! |------|-------|--------|
//! | 1 | Register | business name, owner full name, commerce number, NIN, license id, wilaya, address |
//! | 2 | Credential | email, phone, password, confirm password |
//! | 3 | Documents | import license, commercial register, ID front, ID back |
//! | 4 | Selfie | selfie image |
//!
//! The mapping never changes at runtime; error routing depends on it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed country prefix shown in front of the phone digits.
pub const PHONE_PREFIX: &str = "+213";

/// Number of significant phone digits after the prefix.
pub const PHONE_DIGITS: usize = 9;

/// Exact length of a National Identification Number.
pub const NIN_LENGTH: usize = 18;

// =============================================================================
// Steps
// =============================================================================

/// Ordinal position in the data-entry part of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    Business = 1,
    Credentials = 2,
    Documents = 3,
    Selfie = 4,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Business, Step::Credentials, Step::Documents, Step::Selfie];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Step::Business),
            2 => Some(Step::Credentials),
            3 => Some(Step::Documents),
            4 => Some(Step::Selfie),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number().saturating_sub(1))
    }

    /// Label shown on the step indicator.
    pub fn label(self) -> &'static str {
        match self {
            Step::Business => "Register",
            Step::Credentials => "Credential",
            Step::Documents => "Documents",
            Step::Selfie => "Selfie",
        }
    }

    /// Fields owned by this step, in display order.
    pub fn fields(self) -> &'static [Field] {
        match self {
            Step::Business => &[
                Field::BusinessName,
                Field::OwnerFullName,
                Field::CommerceNumber,
                Field::Nin,
                Field::LicenseId,
                Field::Wilaya,
                Field::Address,
            ],
            Step::Credentials => &[
                Field::Email,
                Field::Phone,
                Field::Password,
                Field::ConfirmPassword,
            ],
            Step::Documents => &[
                Field::ImportLicense,
                Field::CommercialRegister,
                Field::IdFront,
                Field::IdBack,
            ],
            Step::Selfie => &[Field::Selfie],
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// =============================================================================
// Fields
// =============================================================================

/// Every user-editable field of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    BusinessName,
    OwnerFullName,
    CommerceNumber,
    Nin,
    LicenseId,
    Wilaya,
    Address,
    Email,
    Phone,
    Password,
    ConfirmPassword,
    ImportLicense,
    CommercialRegister,
    IdFront,
    IdBack,
    Selfie,
}

impl Field {
    /// Static field -> step ownership.
    pub fn step(self) -> Step {
        match self {
            Field::BusinessName
            | Field::OwnerFullName
            | Field::CommerceNumber
            | Field::Nin
            | Field::LicenseId
            | Field::Wilaya
            | Field::Address => Step::Business,
            Field::Email | Field::Phone | Field::Password | Field::ConfirmPassword => {
                Step::Credentials
            }
            Field::ImportLicense | Field::CommercialRegister | Field::IdFront | Field::IdBack => {
                Step::Documents
            }
            Field::Selfie => Step::Selfie,
        }
    }

    /// Whether the field must be filled before submission.
    ///
    /// The back of the ID card and the profile extras are optional.
    pub fn is_required(self) -> bool {
        !matches!(
            self,
            Field::IdBack | Field::LicenseId | Field::Wilaya | Field::Address
        )
    }

    pub fn is_artifact(self) -> bool {
        matches!(
            self,
            Field::ImportLicense
                | Field::CommercialRegister
                | Field::IdFront
                | Field::IdBack
                | Field::Selfie
        )
    }
}

// =============================================================================
// Binary Artifacts
// =============================================================================

/// Stable identity of an attached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        ArtifactId(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("unsupported file type: {0} (expected pdf, jpg, jpeg or png)")]
    UnsupportedType(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file is empty: {0}")]
    Empty(String),
}

/// An in-memory file attached to the wizard.
///
/// Content is shared, so cloning an artifact keeps its identity and does not
/// copy the bytes. A replaced artifact gets a new [`ArtifactId`].
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    id: ArtifactId,
    file_name: String,
    mime_type: String,
    data: Arc<[u8]>,
}

impl Artifact {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            id: ArtifactId::new(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Load a document the way the file picker accepts it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let mime_type = document_mime_type(path)
            .ok_or_else(|| ArtifactError::UnsupportedType(display.clone()))?;

        let data = std::fs::read(path).map_err(|source| ArtifactError::Read {
            path: display.clone(),
            source,
        })?;
        if data.is_empty() {
            return Err(ArtifactError::Empty(display));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        Ok(Self::new(file_name, mime_type, data))
    }

    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Bytes are deliberately left out of Debug output.
impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

fn document_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// A captured selfie, held as an encoded `data:` URL until transfer.
#[derive(Clone, PartialEq, Eq)]
pub struct SelfieImage {
    id: ArtifactId,
    data_url: String,
}

impl SelfieImage {
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self {
            id: ArtifactId::new(),
            data_url: data_url.into(),
        }
    }

    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

impl fmt::Debug for SelfieImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfieImage")
            .field("id", &self.id)
            .field("len", &self.data_url.len())
            .finish()
    }
}

// =============================================================================
// Wizard Snapshot
// =============================================================================

/// Everything the wizard has collected so far.
///
/// Created empty when the wizard mounts and mutated field by field. Text
/// fields are stored exactly as typed; trimming and phone normalisation
/// happen during validation and submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardSnapshot {
    pub business_name: String,
    pub owner_full_name: String,
    pub commerce_number: String,
    pub nin: String,
    pub license_id: String,
    pub wilaya: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
    pub import_license: Option<Artifact>,
    pub commercial_register: Option<Artifact>,
    pub id_front: Option<Artifact>,
    pub id_back: Option<Artifact>,
    pub selfie: Option<SelfieImage>,
}

impl WizardSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text value of a text field, `None` for artifact fields.
    pub fn text(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::BusinessName => &self.business_name,
            Field::OwnerFullName => &self.owner_full_name,
            Field::CommerceNumber => &self.commerce_number,
            Field::Nin => &self.nin,
            Field::LicenseId => &self.license_id,
            Field::Wilaya => &self.wilaya,
            Field::Address => &self.address,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::Password => &self.password,
            Field::ConfirmPassword => &self.confirm_password,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Overwrite a text field. Returns `false` for artifact fields.
    pub fn set_text(&mut self, field: Field, value: impl Into<String>) -> bool {
        let slot = match field {
            Field::BusinessName => &mut self.business_name,
            Field::OwnerFullName => &mut self.owner_full_name,
            Field::CommerceNumber => &mut self.commerce_number,
            Field::Nin => &mut self.nin,
            Field::LicenseId => &mut self.license_id,
            Field::Wilaya => &mut self.wilaya,
            Field::Address => &mut self.address,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
            Field::Password => &mut self.password,
            Field::ConfirmPassword => &mut self.confirm_password,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    /// Attach or clear a document. Returns `false` for non-document fields.
    pub fn set_document(&mut self, field: Field, artifact: Option<Artifact>) -> bool {
        let slot = match field {
            Field::ImportLicense => &mut self.import_license,
            Field::CommercialRegister => &mut self.commercial_register,
            Field::IdFront => &mut self.id_front,
            Field::IdBack => &mut self.id_back,
            _ => return false,
        };
        *slot = artifact;
        true
    }

    pub fn document(&self, field: Field) -> Option<&Artifact> {
        match field {
            Field::ImportLicense => self.import_license.as_ref(),
            Field::CommercialRegister => self.commercial_register.as_ref(),
            Field::IdFront => self.id_front.as_ref(),
            Field::IdBack => self.id_back.as_ref(),
            _ => None,
        }
    }

    /// Whether a field holds a non-blank value.
    pub fn is_filled(&self, field: Field, selfie_present: bool) -> bool {
        match field {
            Field::Selfie => selfie_present,
            Field::Phone => !phone_digits(&self.phone, PHONE_PREFIX).is_empty(),
            f if f.is_artifact() => self.document(f).is_some(),
            f => self.text(f).is_some_and(|v| !v.trim().is_empty()),
        }
    }
}

// =============================================================================
// Phone Numbers
// =============================================================================

/// Significant digits of a phone entry, with the country prefix removed.
///
/// Accepts `+213 612 34 56 78`, `+213612345678` and `612345678` alike.
/// The bare prefix yields an empty string.
pub fn phone_digits(raw: &str, prefix: &str) -> String {
    let trimmed = raw.trim();
    let rest = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
    rest.chars().filter(char::is_ascii_digit).collect()
}

/// Digits-only phone number with the prefix reattached.
pub fn normalize_phone(raw: &str, prefix: &str) -> String {
    format!("{prefix}{}", phone_digits(raw, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_belongs_to_the_step_that_lists_it() {
        for step in Step::ALL {
            for field in step.fields() {
                assert_eq!(field.step(), step, "{field:?}");
            }
        }
    }

    #[test]
    fn step_navigation_is_bounded() {
        assert_eq!(Step::Business.previous(), None);
        assert_eq!(Step::Business.next(), Some(Step::Credentials));
        assert_eq!(Step::Selfie.next(), None);
        assert_eq!(Step::from_number(0), None);
        assert_eq!(Step::from_number(3), Some(Step::Documents));
    }

    #[test]
    fn phone_digits_strip_prefix_and_formatting() {
        assert_eq!(phone_digits("+213 612 34 56 78", "+213"), "612345678");
        assert_eq!(phone_digits("612345678", "+213"), "612345678");
        assert_eq!(phone_digits("+213", "+213"), "");
        assert_eq!(phone_digits("  +213  ", "+213"), "");
    }

    #[test]
    fn normalize_phone_has_no_formatting_artifacts() {
        assert_eq!(normalize_phone("612345678", "+213"), "+213612345678");
        assert_eq!(normalize_phone("+213 612-34-56-78", "+213"), "+213612345678");
    }

    #[test]
    fn replacing_an_artifact_changes_identity() {
        let first = Artifact::new("a.pdf", "application/pdf", vec![1u8, 2, 3]);
        let copy = first.clone();
        let second = Artifact::new("a.pdf", "application/pdf", vec![1u8, 2, 3]);
        assert_eq!(first.id(), copy.id());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn artifact_from_path_checks_extension() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("License.PDF");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let artifact = Artifact::from_path(&pdf).unwrap();
        assert_eq!(artifact.mime_type(), "application/pdf");
        assert_eq!(artifact.file_name(), "License.PDF");

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();
        assert!(matches!(
            Artifact::from_path(&txt),
            Err(ArtifactError::UnsupportedType(_))
        ));

        let empty = dir.path().join("empty.png");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(Artifact::from_path(&empty), Err(ArtifactError::Empty(_))));
    }

    #[test]
    fn set_text_rejects_artifact_fields() {
        let mut snapshot = WizardSnapshot::new();
        assert!(snapshot.set_text(Field::Email, "a@b.dz"));
        assert!(!snapshot.set_text(Field::IdFront, "x"));
        assert_eq!(snapshot.text(Field::Email), Some("a@b.dz"));
    }
}
