use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand_core::OsRng;

use crate::errors::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(
            "password",
            format!("password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Unicode lowercase copy used for case-insensitive search; SQLite's own
/// `LIKE` and `lower()` only fold ASCII.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Trims and drops empty strings so `?search=` behaves like an absent parameter.
pub fn filled(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_case_handles_non_ascii() {
        assert_eq!(fold_case("Études ANNUELLES"), "études annuelles");
        assert_eq!(fold_case("ÄRGER"), "ärger");
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(hash_password("short"), Err(AppError::Validation(_))));
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("password123").unwrap();
        assert!(verify_password("password123", &hash).unwrap());
        assert!(!verify_password("password124", &hash).unwrap());
    }

    #[test]
    fn filled_ignores_blank_values() {
        assert_eq!(filled(Some("  ")), None);
        assert_eq!(filled(None), None);
        assert_eq!(filled(Some(" guide ")), Some("guide"));
    }
}
