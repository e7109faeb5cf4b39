use telegram_auth::TelegramAuthError;
use thiserror::Error;

/// Closed failure taxonomy for the login flow.
///
/// Remote-client failures are classified into this set exactly once, at the
/// orchestrator boundary; no raw transport error reaches the inbound API.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid phone number")]
    InvalidPhone,

    #[error("phone number is banned")]
    PhoneBanned,

    #[error("rate limited by the remote service")]
    RateLimited { retry_after_seconds: u64 },

    #[error("a code was already requested for this number")]
    TooSoon { retry_after_seconds: u64 },

    #[error("no pending login for this number, or it has expired")]
    NotFoundOrExpired,

    #[error("invalid confirmation code")]
    InvalidCode,

    #[error("confirmation code expired")]
    CodeExpired,

    #[error("invalid two-factor password")]
    InvalidPassword,

    #[error("temporary failure talking to the remote service")]
    TransientNetwork,

    #[error("session storage failure")]
    Storage(#[from] sqlx::Error),
}

impl LoginError {
    /// Stable discriminant surfaced to API callers.
    ///
    /// Storage failures are internal; callers see the generic transient code
    /// while the cause goes to the logs.
    pub fn code(&self) -> &'static str {
        match self {
            LoginError::InvalidPhone => "invalid_phone",
            LoginError::PhoneBanned => "phone_banned",
            LoginError::RateLimited { .. } => "rate_limited",
            LoginError::TooSoon { .. } => "too_soon",
            LoginError::NotFoundOrExpired => "not_found_or_expired",
            LoginError::InvalidCode => "invalid_code",
            LoginError::CodeExpired => "code_expired",
            LoginError::InvalidPassword => "invalid_password",
            LoginError::TransientNetwork | LoginError::Storage(_) => "transient_network_error",
        }
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            LoginError::RateLimited {
                retry_after_seconds,
            }
            | LoginError::TooSoon {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

/// Map a remote-client failure onto the closed taxonomy.
///
/// Pure function of the error value; it never looks at registry or store
/// state.
pub fn classify(err: &TelegramAuthError) -> LoginError {
    match err {
        TelegramAuthError::InvalidPhone => LoginError::InvalidPhone,
        TelegramAuthError::PhoneBanned => LoginError::PhoneBanned,
        TelegramAuthError::FloodWait { seconds } => LoginError::RateLimited {
            retry_after_seconds: *seconds,
        },
        TelegramAuthError::InvalidCode => LoginError::InvalidCode,
        TelegramAuthError::CodeExpired => LoginError::CodeExpired,
        TelegramAuthError::InvalidPassword => LoginError::InvalidPassword,
        TelegramAuthError::Connect(_)
        | TelegramAuthError::Proxy(_)
        | TelegramAuthError::Transport(_)
        | TelegramAuthError::Other(_) => LoginError::TransientNetwork,
    }
}

/// Whether the failure leaves the underlying client unusable, so the pending
/// entry must be torn down instead of kept for a retry.
pub fn is_client_fatal(err: &TelegramAuthError) -> bool {
    matches!(
        err,
        TelegramAuthError::Connect(_) | TelegramAuthError::Transport(_)
    )
}
