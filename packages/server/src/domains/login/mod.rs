//! Account-login domain: the in-flight attempt registry, the flow state
//! machine, the error taxonomy, and the durable session records a completed
//! flow produces.

pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod session_key;

pub use errors::LoginError;
pub use orchestrator::{
    AuthenticatedSession, CodeRequested, LoginConfig, LoginOrchestrator, SubmitCodeOutcome,
};
pub use registry::{PendingLogin, PendingLoginRegistry};

/// Normalize a caller-supplied phone number to the E.164-like form the
/// registry and session store key on: leading `+`, digits only, separators
/// stripped.
pub fn normalize_phone(raw: &str) -> Result<String, LoginError> {
    let trimmed = raw.trim();
    let rest = trimmed.strip_prefix('+').ok_or(LoginError::InvalidPhone)?;

    let digits: String = rest
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(LoginError::InvalidPhone);
    }
    if !(7..=15).contains(&digits.len()) {
        return Err(LoginError::InvalidPhone);
    }

    Ok(format!("+{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_away() {
        assert_eq!(
            normalize_phone(" +1 (555) 123-4567 ").unwrap(),
            "+15551234567"
        );
        assert_eq!(normalize_phone("+15551234567").unwrap(), "+15551234567");
    }

    #[test]
    fn rejects_numbers_without_country_code_prefix() {
        assert!(matches!(
            normalize_phone("15551234567"),
            Err(LoginError::InvalidPhone)
        ));
    }

    #[test]
    fn rejects_garbage_and_bad_lengths() {
        assert!(normalize_phone("+").is_err());
        assert!(normalize_phone("+555abc").is_err());
        assert!(normalize_phone("+123").is_err());
        assert!(normalize_phone("+1234567890123456").is_err());
    }
}
