use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::AppError;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref URL_RE: Regex = Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_url(url: &str) -> bool {
    URL_RE.is_match(url)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Per-field validation messages, reported to the client as a single 422.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn min_chars(&mut self, field: &str, value: &str, min: usize) {
        self.check(
            value.chars().count() >= min,
            field,
            &format!("must be at least {min} characters"),
        );
    }

    pub fn email(&mut self, field: &str, value: &str) {
        self.check(is_valid_email(value), field, "must be a valid email");
    }

    pub fn optional_url(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.check(is_valid_url(v), field, "must be a valid url");
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

pub const DEFAULT_LIMIT: i64 = 20;

/// `skip`/`limit` pair shared by every listing.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub skip: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(skip: i64, limit: i64) -> Result<Self, AppError> {
        let page = Self { skip, limit };
        page.validate()?;
        Ok(page)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(self.skip >= 0, "skip", "must be greater than or equal to 0");
        errors.check(self.limit >= 1, "limit", "must be greater than or equal to 1");
        errors.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_valid_email("ana@example.com"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("ana example.com"));
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }

    #[test]
    fn urls() {
        assert!(is_valid_url("https://cdn.example.com/a.png"));
        assert!(is_valid_url("http://localhost:3000"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("example.com/a.png"));
    }

    #[test]
    fn field_errors_keep_first_message() {
        let mut errors = FieldErrors::new();
        errors.min_chars("fullName", "Al", 3);
        errors.check(false, "fullName", "other");
        errors.email("email", "nope");
        errors.optional_url("avatarUrl", Some(""));
        errors.optional_url("coverUrl", Some("nope"));
        assert_eq!(errors.get("fullName"), Some("must be at least 3 characters"));
        assert_eq!(errors.get("email"), Some("must be a valid email"));
        assert_eq!(errors.get("avatarUrl"), None);
        assert_eq!(errors.get("coverUrl"), Some("must be a valid url"));
        assert!(matches!(errors.finish(), Err(AppError::Validation(_))));
    }

    #[test]
    fn pagination_bounds() {
        assert!(Pagination::new(0, 1).is_ok());
        assert!(Pagination::new(25, 20).is_ok());
        assert!(matches!(Pagination::new(0, 0), Err(AppError::Validation(_))));
        assert!(matches!(Pagination::new(0, -3), Err(AppError::Validation(_))));
        assert!(matches!(Pagination::new(-1, 20), Err(AppError::Validation(_))));
        let page = Pagination::default();
        assert_eq!((page.skip, page.limit), (0, 20));
    }
}
