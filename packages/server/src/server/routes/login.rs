//! JSON endpoints for the login flow.
//!
//! Each handler returns either a success payload or a taxonomy error code;
//! raw internal errors never cross this boundary.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::domains::login::{LoginError, SubmitCodeOutcome};
use crate::server::app::AppState;

#[derive(Deserialize)]
pub struct RequestCodeBody {
    pub phone_number: String,
}

#[derive(Deserialize)]
pub struct SubmitCodeBody {
    pub phone_number: String,
    pub verification_token: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct SubmitPasswordBody {
    pub phone_number: String,
    pub password: String,
}

pub async fn request_code_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<Json<serde_json::Value>, LoginApiError> {
    let granted = state.orchestrator.request_code(&body.phone_number).await?;
    Ok(Json(json!({
        "status": "code_sent",
        "verification_token": granted.verification_token,
        "resend_timeout_seconds": granted.resend_timeout_seconds,
    })))
}

pub async fn submit_code_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<SubmitCodeBody>,
) -> Result<Json<serde_json::Value>, LoginApiError> {
    let outcome = state
        .orchestrator
        .submit_code(&body.phone_number, &body.verification_token, &body.code)
        .await?;
    match outcome {
        SubmitCodeOutcome::SecondFactorRequired => Ok(Json(json!({
            "status": "second_factor_required",
        }))),
        SubmitCodeOutcome::Authenticated(session) => Ok(Json(json!({
            "status": "authenticated",
            "session_key": session.session_key,
            "user": {
                "id": session.remote_user_id,
                "name": session.display_name,
                "handle": session.handle,
            },
        }))),
    }
}

pub async fn submit_password_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<SubmitPasswordBody>,
) -> Result<Json<serde_json::Value>, LoginApiError> {
    let session = state
        .orchestrator
        .submit_second_factor(&body.phone_number, &body.password)
        .await?;
    Ok(Json(json!({
        "status": "authenticated",
        "session_key": session.session_key,
        "user": {
            "id": session.remote_user_id,
            "name": session.display_name,
            "handle": session.handle,
        },
    })))
}

/// Wrapper turning a [`LoginError`] into an HTTP response.
pub struct LoginApiError(pub LoginError);

impl From<LoginError> for LoginApiError {
    fn from(err: LoginError) -> Self {
        Self(err)
    }
}

impl IntoResponse for LoginApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LoginError::InvalidPhone
            | LoginError::InvalidCode
            | LoginError::InvalidPassword => StatusCode::BAD_REQUEST,
            LoginError::PhoneBanned => StatusCode::FORBIDDEN,
            LoginError::TooSoon { .. } | LoginError::RateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            LoginError::NotFoundOrExpired => StatusCode::NOT_FOUND,
            LoginError::CodeExpired => StatusCode::GONE,
            LoginError::TransientNetwork | LoginError::Storage(_) => StatusCode::BAD_GATEWAY,
        };

        let mut body = json!({ "error": self.0.code() });
        if let Some(seconds) = self.0.retry_after_seconds() {
            body["retry_after_seconds"] = json!(seconds);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_and_statuses_are_stable() {
        let cases = [
            (LoginError::InvalidPhone, StatusCode::BAD_REQUEST, "invalid_phone"),
            (LoginError::PhoneBanned, StatusCode::FORBIDDEN, "phone_banned"),
            (
                LoginError::TooSoon { retry_after_seconds: 90 },
                StatusCode::TOO_MANY_REQUESTS,
                "too_soon",
            ),
            (
                LoginError::RateLimited { retry_after_seconds: 30 },
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
            ),
            (
                LoginError::NotFoundOrExpired,
                StatusCode::NOT_FOUND,
                "not_found_or_expired",
            ),
            (LoginError::InvalidCode, StatusCode::BAD_REQUEST, "invalid_code"),
            (LoginError::CodeExpired, StatusCode::GONE, "code_expired"),
            (
                LoginError::InvalidPassword,
                StatusCode::BAD_REQUEST,
                "invalid_password",
            ),
            (
                LoginError::TransientNetwork,
                StatusCode::BAD_GATEWAY,
                "transient_network_error",
            ),
        ];
        for (err, expected_status, expected_code) in cases {
            assert_eq!(err.code(), expected_code);
            let response = LoginApiError(err).into_response();
            assert_eq!(response.status(), expected_status);
        }
    }
}
