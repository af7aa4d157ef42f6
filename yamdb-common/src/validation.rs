//! Field validation rules shared by every entity
//!
//! Each `validate_*` function checks one field and records failures into a
//! [`FieldErrors`] map keyed by field name. Handlers collect all failures for
//! a request before rejecting it, so a client sees every problem at once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::time::current_year;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PERSON_NAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 256;
pub const SLUG_MAX_LENGTH: usize = 50;
pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;

/// Username reserved for the `/users/me/` endpoint
pub const RESERVED_USERNAME: &str = "me";

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+\z").expect("username pattern"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+\z").expect("email pattern"));
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+\z").expect("slug pattern"));

/// Validation failures keyed by field name
///
/// Serializes as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field error
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Unwrap a required field or record it as missing
pub fn require<'a, T>(errors: &mut FieldErrors, field: &str, value: &'a Option<T>) -> Option<&'a T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value.as_ref()
}

fn check_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> bool {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        );
        return false;
    }
    true
}

fn check_not_blank(errors: &mut FieldErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, BLANK);
        return false;
    }
    true
}

pub fn validate_username(errors: &mut FieldErrors, value: &str) {
    const FIELD: &str = "username";
    if !check_not_blank(errors, FIELD, value) || !check_length(errors, FIELD, value, USERNAME_MAX_LENGTH) {
        return;
    }
    if !USERNAME_RE.is_match(value) {
        errors.add(
            FIELD,
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    } else if value == RESERVED_USERNAME {
        errors.add(FIELD, format!("Username '{}' is not allowed.", RESERVED_USERNAME));
    }
}

pub fn validate_email(errors: &mut FieldErrors, value: &str) {
    const FIELD: &str = "email";
    if !check_not_blank(errors, FIELD, value) || !check_length(errors, FIELD, value, EMAIL_MAX_LENGTH) {
        return;
    }
    if !EMAIL_RE.is_match(value) {
        errors.add(FIELD, "Enter a valid email address.");
    }
}

/// first_name / last_name
pub fn validate_person_name(errors: &mut FieldErrors, field: &str, value: &str) {
    check_length(errors, field, value, PERSON_NAME_MAX_LENGTH);
}

/// Category, genre and title names
pub fn validate_name(errors: &mut FieldErrors, value: &str) {
    if check_not_blank(errors, "name", value) {
        check_length(errors, "name", value, NAME_MAX_LENGTH);
    }
}

pub fn validate_slug(errors: &mut FieldErrors, value: &str) {
    const FIELD: &str = "slug";
    if !check_not_blank(errors, FIELD, value) || !check_length(errors, FIELD, value, SLUG_MAX_LENGTH) {
        return;
    }
    if !SLUG_RE.is_match(value) {
        errors.add(
            FIELD,
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        );
    }
}

/// A title cannot be released after the current year
pub fn validate_year(errors: &mut FieldErrors, value: i32) {
    let year = current_year();
    if value > year {
        errors.add(
            "year",
            format!("Year {} is in the future (current year is {}).", value, year),
        );
    }
}

pub fn validate_score(errors: &mut FieldErrors, value: i64) {
    if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
        errors.add(
            "score",
            format!("Score must be between {} and {}.", MIN_SCORE, MAX_SCORE),
        );
    }
}

/// Review and comment bodies
pub fn validate_text(errors: &mut FieldErrors, value: &str) {
    check_not_blank(errors, "text", value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn username_errors(value: &str) -> FieldErrors {
        let mut errors = FieldErrors::new();
        validate_username(&mut errors, value);
        errors
    }

    #[test]
    fn test_username_accepts_allowed_characters() {
        assert!(username_errors("john.doe+test@mail-box_1").is_empty());
        assert!(username_errors("Пользователь").is_empty());
    }

    #[test]
    fn test_username_rejects_spaces_and_symbols() {
        assert!(username_errors("john doe").contains("username"));
        assert!(username_errors("bad#name").contains("username"));
        assert!(username_errors("trailing\n").contains("username"));
    }

    #[test]
    fn test_username_me_is_reserved() {
        let errors = username_errors("me");
        assert!(errors.get("username").unwrap()[0].contains("not allowed"));
        // Only the exact reserved word is blocked
        assert!(username_errors("meme").is_empty());
    }

    #[test]
    fn test_username_length_limit() {
        assert!(username_errors(&"a".repeat(150)).is_empty());
        assert!(username_errors(&"a".repeat(151)).contains("username"));
    }

    #[test]
    fn test_email_format() {
        let mut errors = FieldErrors::new();
        validate_email(&mut errors, "user@example.com");
        assert!(errors.is_empty());

        validate_email(&mut errors, "not-an-email");
        assert!(errors.contains("email"));
    }

    #[test]
    fn test_email_length_limit() {
        let mut errors = FieldErrors::new();
        let local = "a".repeat(250);
        validate_email(&mut errors, &format!("{}@x.io", local));
        assert!(errors.contains("email"));
    }

    #[test]
    fn test_slug_pattern() {
        let mut errors = FieldErrors::new();
        validate_slug(&mut errors, "sci-fi_2");
        assert!(errors.is_empty());

        validate_slug(&mut errors, "sci fi");
        assert!(errors.contains("slug"));
    }

    #[test]
    fn test_year_not_in_future() {
        let mut errors = FieldErrors::new();
        validate_year(&mut errors, 1999);
        validate_year(&mut errors, current_year());
        assert!(errors.is_empty());

        validate_year(&mut errors, current_year() + 1);
        assert!(errors.contains("year"));
    }

    #[test]
    fn test_score_bounds() {
        let mut errors = FieldErrors::new();
        validate_score(&mut errors, 1);
        validate_score(&mut errors, 10);
        assert!(errors.is_empty());

        validate_score(&mut errors, 0);
        validate_score(&mut errors, 11);
        assert_eq!(errors.get("score").unwrap().len(), 2);
    }

    #[test]
    fn test_require_records_missing_field() {
        let mut errors = FieldErrors::new();
        let present = Some("x".to_string());
        let missing: Option<String> = None;

        assert!(require(&mut errors, "a", &present).is_some());
        assert!(require(&mut errors, "b", &missing).is_none());
        assert_eq!(errors.get("b").unwrap(), &[REQUIRED.to_string()]);
        assert!(!errors.contains("a"));
    }

    #[test]
    fn test_field_errors_serialize_as_map() {
        let mut errors = FieldErrors::single("email", "taken");
        errors.add("email", "again");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"email": ["taken", "again"]}));
    }
}
