//! API handlers module

pub mod graph;
pub mod health;
pub mod jobs;
pub mod profiles;

use serde::Deserialize;
use skillgraph_common::errors::{AppError, Result};
use validator::{Validate, ValidationError};

/// Developer login as taken from the URL
#[derive(Debug, Deserialize, Validate)]
pub struct LoginParam {
    #[validate(length(min = 1, max = 39), custom(function = "validate_login_chars"))]
    pub login: String,
}

fn validate_login_chars(login: &str) -> std::result::Result<(), ValidationError> {
    if login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        Ok(())
    } else {
        Err(ValidationError::new("login_chars"))
    }
}

/// Validate and normalise a login path segment
pub fn checked_login(raw: String) -> Result<String> {
    let param = LoginParam {
        login: raw.trim().to_lowercase(),
    };
    param.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("login".to_string()),
    })?;
    Ok(param.login)
}
