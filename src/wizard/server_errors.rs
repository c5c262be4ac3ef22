// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mapping of Auth Service field messages back onto wizard steps.
//!
//! The backend reports validation failures as free-text messages such as
//! `user.phoneNumber must be a valid phone number`. Each message is cleaned
//! for display and then attributed to a step in two passes:
//!
//! 1. Backend field names (`registerCommerceImage`, `licenseId`, ...) found
//!    as a run of up to three words resolve through [`Field::step`]
//! 2. Otherwise keywords are matched per word: keywords of three letters or
//!    fewer must equal a whole word, longer ones must prefix a word
//!
//! This is a heuristic, not a structured contract: a message matching
//! nothing is still shown but does not move the step cursor.

use crate::models::{Field, Step};

use super::validation::{ValidationIssue, ValidationResult};

/// Backend field names, lowercased, mapped to the field that owns them.
const FIELD_NAMES: [(&str, Field); 15] = [
    ("registercommerceimage", Field::CommercialRegister),
    ("licenseimage", Field::ImportLicense),
    ("idcardimage", Field::IdFront),
    ("selfieimage", Field::Selfie),
    ("registercommercenumber", Field::CommerceNumber),
    ("licenseid", Field::LicenseId),
    ("businessname", Field::BusinessName),
    ("fullname", Field::OwnerFullName),
    ("nin", Field::Nin),
    ("wilaya", Field::Wilaya),
    ("adress", Field::Address),
    ("phonenumber", Field::Phone),
    ("email", Field::Email),
    ("confirmpassword", Field::ConfirmPassword),
    ("password", Field::Password),
];

/// Keywords per step, checked in step order; the first matching step wins.
const STEP_KEYWORDS: [(Step, &[&str]); 4] = [
    // "adress" is the backend's spelling; plain "address" would catch
    // "email address" messages.
    (
        Step::Business,
        &["name", "nin", "commerce", "business", "wilaya", "adress"],
    ),
    (Step::Credentials, &["email", "password", "phone"]),
    (
        Step::Documents,
        &["license", "licence", "register", "id", "card", "document"],
    ),
    (Step::Selfie, &["selfie"]),
];

/// Clean every message and attribute it to a step.
pub fn route_server_messages<S: AsRef<str>>(messages: &[S]) -> ValidationResult {
    messages
        .iter()
        .map(|raw| clean_message(raw.as_ref()))
        .filter(|m| !m.is_empty())
        .map(|message| {
            let step = step_for_message(&message);
            ValidationIssue::for_step(step, message)
        })
        .collect()
}

/// Strip the field path, split camelCase and capitalize.
///
/// `user.phoneNumber must be valid` becomes `Phone number must be valid`.
pub fn clean_message(raw: &str) -> String {
    let trimmed = raw.trim();
    let (head, tail) = match trimmed.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, Some(tail)),
        None => (trimmed, None),
    };

    let head = strip_field_path(head);
    let mut cleaned = split_camel_case(head);
    if let Some(tail) = tail {
        cleaned.push(' ');
        cleaned.push_str(tail.trim_start());
    }

    capitalize(&cleaned)
}

/// Step owning the field named in the message, else the first step whose
/// keywords appear in it.
pub fn step_for_message(message: &str) -> Option<Step> {
    let lowered = message.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if let Some(field) = field_in_words(&words) {
        return Some(field.step());
    }

    STEP_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|kw| words.iter().any(|w| word_matches(w, kw)))
        })
        .map(|(step, _)| *step)
}

fn field_in_words(words: &[&str]) -> Option<Field> {
    FIELD_NAMES
        .iter()
        .find(|(name, _)| {
            (1..=3).any(|len| words.windows(len).any(|run| run.concat() == *name))
        })
        .map(|(_, field)| *field)
}

fn word_matches(word: &str, keyword: &str) -> bool {
    // Short keywords ("id", "nin") only match whole words.
    if keyword.len() <= 3 {
        word == keyword
    } else {
        word.starts_with(keyword)
    }
}

fn strip_field_path(word: &str) -> &str {
    if !word.contains(['.', '[']) {
        return word;
    }
    word.split(['.', '[', ']'])
        .rfind(|segment| !segment.is_empty())
        .unwrap_or(word)
}

fn split_camel_case(word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    let mut out = String::with_capacity(word.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let boundary = c.is_uppercase()
            && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());

        if boundary {
            out.push(' ');
            // Keep acronyms such as "NIN" intact.
            if next.is_some_and(char::is_lowercase) {
                out.extend(c.to_lowercase());
                continue;
            }
        }
        out.push(c);
    }

    out
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
