//! Parsing error types
//!
//! Extraction never fails as a whole; these errors describe why a single
//! row or embedded block was skipped and end up in debug logs.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Required field '{field}' not found")]
    RequiredFieldMissing { field: String, context: Option<String> },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Embedded JSON block {index} is not valid JSON: {reason}")]
    InvalidJson { index: usize, reason: String },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed { url: String, reason: String },

    #[error("No listing identity in row: {context}")]
    MissingIdentity { context: String },
}

impl ParsingError {
    pub fn required_field(field: &str) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
            context: None,
        }
    }

    pub fn required_field_with_context(field: &str, context: &str) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
            context: Some(context.to_string()),
        }
    }

    pub fn invalid_selector(selector: &str, reason: &str) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn url_resolution_failed(url: &str, reason: &str) -> Self {
        Self::UrlResolutionFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
