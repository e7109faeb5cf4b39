//! Request/response types for the account-auth capability and the bridge wire format.

use serde::{Deserialize, Serialize};

/// Result of requesting a one-time login code.
///
/// The `verification_token` must be handed back when the code is redeemed
/// (Telegram calls this the `phone_code_hash`).
#[derive(Debug, Clone)]
pub struct SentCode {
    pub verification_token: String,
    pub resend_timeout_seconds: u64,
}

/// Result of submitting a one-time code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    Authenticated,
    /// The account has a cloud password; the flow continues with
    /// [`AuthClient::submit_password`](crate::AuthClient::submit_password).
    SecondFactorRequired,
}

/// Identity of the account a client is authenticated as.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub remote_user_id: i64,
    pub display_name: String,
    pub handle: Option<String>,
}

// ---------------------------------------------------------------------------
// Bridge wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub api_id: i32,
    pub api_hash: &'a str,
    pub phone_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendCodeRequest<'a> {
    pub phone_number: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendCodeResponse {
    pub phone_code_hash: String,
    #[serde(default)]
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignInRequest<'a> {
    pub phone_number: &'a str,
    pub phone_code_hash: &'a str,
    pub code: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckPasswordRequest<'a> {
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignInResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeResponse {
    pub user_id: i64,
    pub display_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Error body returned by the bridge on any non-2xx response. The `error`
/// field carries the upstream RPC error name verbatim (`PHONE_CODE_INVALID`,
/// `FLOOD_WAIT_23`, ...).
#[derive(Debug, Deserialize)]
pub(crate) struct BridgeErrorBody {
    pub error: String,
    #[serde(default)]
    pub retry_after: Option<u64>,
}
