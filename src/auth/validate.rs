use std::sync::LazyLock;

use regex::Regex;

use crate::{users::normalize_email, AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 50;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap()
});

pub fn name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Please provide a name"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation("Name cannot be more than 50 characters"));
    }
    Ok(name.to_owned())
}

/// Returns the normalized (trimmed, lowercased) address.
pub fn email(email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if !EMAIL.is_match(&email) {
        return Err(AppError::validation("Please provide a valid email"));
    }
    Ok(email)
}

pub fn password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password must be at least 6 characters"));
    }
    Ok(())
}
