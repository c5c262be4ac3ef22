// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multipart registration payload.
//!
//! Part names are a contract with the Auth Service and must not change.

use reqwest::multipart::{Form, Part};

use crate::models::Artifact;

use super::AuthServiceError;

pub const USER_FULL_NAME: &str = "user[fullName]";
pub const USER_EMAIL: &str = "user[email]";
pub const USER_PHONE_NUMBER: &str = "user[phoneNumber]";
pub const USER_PASSWORD: &str = "user[password]";
pub const PROFILE_LICENSE_ID: &str = "profile[licenseId]";
pub const PROFILE_REGISTER_COMMERCE_NUMBER: &str = "profile[registerCommerceNumber]";
pub const PROFILE_NIN: &str = "profile[NIN]";
pub const PROFILE_WILAYA: &str = "profile[wilaya]";
pub const PROFILE_ADDRESS: &str = "profile[adress]";

pub const REGISTER_COMMERCE_IMAGE: &str = "registerCommerceImage";
pub const LICENSE_IMAGE: &str = "licenseImage";
pub const ID_CARD_IMAGE: &str = "idCardImage";
pub const SELFIE_IMAGE: &str = "selfieImage";

/// Text and file parts, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RegistrationPayload {
    fields: Vec<(&'static str, String)>,
    files: Vec<(&'static str, Artifact)>,
}

impl RegistrationPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    pub fn file(mut self, name: &'static str, artifact: Artifact) -> Self {
        self.files.push((name, artifact));
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attachment(&self, name: &str) -> Option<&Artifact> {
        self.files.iter().find(|(n, _)| *n == name).map(|(_, a)| a)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(n, _)| *n)
    }

    pub fn file_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.files.iter().map(|(n, _)| *n)
    }

    /// Build the `multipart/form-data` body.
    pub fn into_form(self) -> Result<Form, AuthServiceError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for (name, artifact) in self.files {
            let part = Part::bytes(artifact.data().to_vec())
                .file_name(artifact.file_name().to_string())
                .mime_str(artifact.mime_type())
                .map_err(|e| {
                    AuthServiceError::InvalidRequest(format!(
                        "invalid MIME type {} for {name}: {e}",
                        artifact.mime_type()
                    ))
                })?;
            form = form.part(name, part);
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_follow_insertion() {
        let payload = RegistrationPayload::new()
            .text(USER_EMAIL, "a@b.dz")
            .file(
                SELFIE_IMAGE,
                Artifact::new("selfie.jpg", "image/jpeg", vec![1u8, 2]),
            );
        assert_eq!(payload.field(USER_EMAIL), Some("a@b.dz"));
        assert_eq!(payload.field(USER_PASSWORD), None);
        assert_eq!(payload.attachment(SELFIE_IMAGE).unwrap().len(), 2);
        assert_eq!(payload.file_names().collect::<Vec<_>>(), vec![SELFIE_IMAGE]);
    }

    #[test]
    fn form_rejects_invalid_mime() {
        let payload = RegistrationPayload::new().file(
            LICENSE_IMAGE,
            Artifact::new("x.pdf", "not a mime", vec![1u8]),
        );
        assert!(payload.into_form().is_err());
    }

    #[test]
    fn form_builds_for_valid_parts() {
        let payload = RegistrationPayload::new()
            .text(USER_FULL_NAME, "Amina Benali")
            .file(
                LICENSE_IMAGE,
                Artifact::new("license.pdf", "application/pdf", vec![1u8]),
            );
        let form = payload.into_form().unwrap();
        assert!(!form.boundary().is_empty());
    }
}
