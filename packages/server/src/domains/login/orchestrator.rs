//! The login flow state machine.
//!
//! `NoSession -> CodeRequested -> CodeVerified (awaiting 2FA) -> Authenticated`,
//! with failures classified onto the closed [`LoginError`] taxonomy. State
//! between steps lives in the [`PendingLoginRegistry`]; a completed flow
//! persists exactly one [`SessionRecord`] and frees its phone number.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use telegram_auth::{SignInOutcome, TelegramAuthError};

use super::errors::{classify, is_client_fatal, LoginError};
use super::models::SessionRecord;
use super::registry::{PendingLogin, PendingLoginRegistry, SlotGuard};
use super::{normalize_phone, session_key};
use crate::kernel::ServerDeps;

/// Timing knobs for the flow.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// Minimum interval between code requests for one phone number.
    pub resend_interval: Duration,
    /// Age past which a pending attempt is invalid on next access.
    pub pending_expiry: Duration,
    /// Bound on connect and code-request calls.
    pub connect_timeout: Duration,
    /// Bound on code and password submission; sign-in can be slow upstream.
    pub submit_timeout: Duration,
    /// Pacing pause before send and before verify, matching the remote
    /// service's expectations. Non-blocking sleep.
    pub pacing_delay: Duration,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            resend_interval: Duration::from_secs(120),
            pending_expiry: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(40),
            pacing_delay: Duration::from_secs(2),
        }
    }
}

/// Result of a successful `request_code`.
#[derive(Debug, Clone, Serialize)]
pub struct CodeRequested {
    pub verification_token: String,
    pub resend_timeout_seconds: u64,
}

/// Result of a completed flow.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedSession {
    pub session_key: String,
    pub remote_user_id: i64,
    pub display_name: String,
    pub handle: Option<String>,
}

/// `submit_code` either finishes the flow or legitimately asks for the
/// second factor; the latter is not an error.
#[derive(Debug)]
pub enum SubmitCodeOutcome {
    Authenticated(AuthenticatedSession),
    SecondFactorRequired,
}

pub struct LoginOrchestrator {
    deps: ServerDeps,
    registry: PendingLoginRegistry,
    config: LoginConfig,
}

impl LoginOrchestrator {
    pub fn new(deps: ServerDeps, config: LoginConfig) -> Self {
        let registry = PendingLoginRegistry::new(config.resend_interval, config.pending_expiry);
        Self {
            deps,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &PendingLoginRegistry {
        &self.registry
    }

    /// Start a flow: connect a client, request a one-time code, and park the
    /// attempt in the registry.
    ///
    /// Fails `TooSoon` while a fresh attempt exists for the number. On any
    /// remote failure the client is released and no entry is created.
    pub async fn request_code(&self, phone_number: &str) -> Result<CodeRequested, LoginError> {
        let phone = normalize_phone(phone_number)?;
        let slot = self.registry.reserve(&phone).await?;
        // finish() prunes the slot when no entry was installed, so failed
        // requests do not accumulate map entries per phone number.
        let (slot, result) = self.connect_and_request(&phone, slot).await;
        self.finish(slot, &phone);
        result
    }

    async fn connect_and_request(
        &self,
        phone: &str,
        mut slot: SlotGuard,
    ) -> (SlotGuard, Result<CodeRequested, LoginError>) {
        let connected = tokio::time::timeout(
            self.config.connect_timeout,
            self.deps.connector.connect(phone, self.deps.proxy.as_ref()),
        )
        .await;
        let mut client = match connected {
            Err(_) => {
                warn!(phone_number = %phone, "connect timed out");
                return (slot, Err(LoginError::TransientNetwork));
            }
            Ok(Err(e)) => {
                warn!(phone_number = %phone, error = %e, "connect failed");
                return (slot, Err(classify(&e)));
            }
            Ok(Ok(client)) => client,
        };

        tokio::time::sleep(self.config.pacing_delay).await;

        let sent = match tokio::time::timeout(
            self.config.connect_timeout,
            client.request_code(phone),
        )
        .await
        {
            Err(_) => {
                warn!(phone_number = %phone, "code request timed out");
                client.disconnect().await;
                return (slot, Err(LoginError::TransientNetwork));
            }
            Ok(Err(e)) => {
                warn!(phone_number = %phone, error = %e, "code request failed");
                client.disconnect().await;
                return (slot, Err(classify(&e)));
            }
            Ok(Ok(sent)) => sent,
        };

        info!(phone_number = %phone, "login code requested");
        let token = sent.verification_token.clone();
        *slot = Some(PendingLogin::new(
            phone.to_string(),
            client,
            sent.verification_token,
        ));

        (
            slot,
            Ok(CodeRequested {
                verification_token: token,
                resend_timeout_seconds: sent.resend_timeout_seconds,
            }),
        )
    }

    /// Redeem a one-time code against the pending attempt.
    ///
    /// A mismatched or stale token fails `NotFoundOrExpired` without touching
    /// a live entry. An invalid code keeps the entry for a retry; an expired
    /// code discards it.
    pub async fn submit_code(
        &self,
        phone_number: &str,
        verification_token: &str,
        code: &str,
    ) -> Result<SubmitCodeOutcome, LoginError> {
        let phone = normalize_phone(phone_number)?;
        let mut slot = self.registry.claim(&phone).await?;

        {
            let Some(entry) = slot.as_ref() else {
                return Err(LoginError::NotFoundOrExpired);
            };
            if entry.verification_token != verification_token {
                return Err(LoginError::NotFoundOrExpired);
            }
        }

        tokio::time::sleep(self.config.pacing_delay).await;

        let submitted = {
            let Some(entry) = slot.as_mut() else {
                return Err(LoginError::NotFoundOrExpired);
            };
            tokio::time::timeout(
                self.config.submit_timeout,
                entry.client.submit_code(&phone, verification_token, code),
            )
            .await
        };

        let result = match submitted {
            // A timed-out submission may still be transient; the entry stays
            // for a retry until it ages out.
            Err(_) => {
                warn!(phone_number = %phone, "code submission timed out");
                Err(LoginError::TransientNetwork)
            }
            Ok(Err(TelegramAuthError::InvalidCode)) => Err(LoginError::InvalidCode),
            Ok(Err(TelegramAuthError::CodeExpired)) => {
                discard(&mut slot).await;
                Err(LoginError::CodeExpired)
            }
            Ok(Err(e)) => {
                warn!(phone_number = %phone, error = %e, "code submission failed");
                if is_client_fatal(&e) {
                    discard(&mut slot).await;
                }
                Err(classify(&e))
            }
            Ok(Ok(SignInOutcome::SecondFactorRequired)) => {
                info!(phone_number = %phone, "second factor required");
                Ok(SubmitCodeOutcome::SecondFactorRequired)
            }
            Ok(Ok(SignInOutcome::Authenticated)) => self
                .complete(&mut slot, &phone)
                .await
                .map(SubmitCodeOutcome::Authenticated),
        };

        self.finish(slot, &phone);
        result
    }

    /// Answer the cloud-password challenge of an attempt whose code already
    /// verified.
    ///
    /// An invalid password keeps the entry for a retry; hitting the remote
    /// flood limit is terminal for the attempt.
    pub async fn submit_second_factor(
        &self,
        phone_number: &str,
        password: &str,
    ) -> Result<AuthenticatedSession, LoginError> {
        let phone = normalize_phone(phone_number)?;
        let mut slot = self.registry.claim(&phone).await?;

        tokio::time::sleep(self.config.pacing_delay).await;

        let submitted = {
            let Some(entry) = slot.as_mut() else {
                return Err(LoginError::NotFoundOrExpired);
            };
            tokio::time::timeout(
                self.config.submit_timeout,
                entry.client.submit_password(password),
            )
            .await
        };

        let result = match submitted {
            Err(_) => {
                warn!(phone_number = %phone, "password submission timed out");
                Err(LoginError::TransientNetwork)
            }
            Ok(Err(TelegramAuthError::InvalidPassword)) => Err(LoginError::InvalidPassword),
            // Too many password attempts; the remote side won't take more on
            // this session.
            Ok(Err(e @ TelegramAuthError::FloodWait { .. })) => {
                discard(&mut slot).await;
                Err(classify(&e))
            }
            Ok(Err(e)) => {
                warn!(phone_number = %phone, error = %e, "password submission failed");
                if is_client_fatal(&e) {
                    discard(&mut slot).await;
                }
                Err(classify(&e))
            }
            Ok(Ok(())) => self.complete(&mut slot, &phone).await,
        };

        self.finish(slot, &phone);
        result
    }

    /// Terminal success path: fetch the identity, persist the session record,
    /// and tear the attempt down.
    ///
    /// The remote side is authenticated from here on, so the entry comes out
    /// on every branch; retrying after a local failure would mint a duplicate
    /// remote session rather than fix anything.
    async fn complete(
        &self,
        slot: &mut SlotGuard,
        phone: &str,
    ) -> Result<AuthenticatedSession, LoginError> {
        let Some(mut entry) = slot.take() else {
            return Err(LoginError::NotFoundOrExpired);
        };

        let identity = match entry.client.fetch_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(phone_number = %phone, error = %e, "identity fetch failed after sign-in");
                entry.disconnect().await;
                return Err(LoginError::TransientNetwork);
            }
        };

        let now = Utc::now();
        let record = SessionRecord {
            session_key: session_key::generate(phone),
            phone_number: phone.to_string(),
            remote_user_id: identity.remote_user_id,
            display_name: identity.display_name.clone(),
            handle: identity.handle.clone(),
            created_at: now,
            last_used_at: now,
        };
        let saved = self.deps.sessions.insert(&record).await;
        entry.disconnect().await;

        if let Err(e) = saved {
            tracing::error!(phone_number = %phone, error = %e, "failed to persist session record");
            return Err(LoginError::Storage(e));
        }

        info!(
            phone_number = %phone,
            remote_user_id = identity.remote_user_id,
            "login complete"
        );
        Ok(AuthenticatedSession {
            session_key: record.session_key,
            remote_user_id: identity.remote_user_id,
            display_name: identity.display_name,
            handle: identity.handle,
        })
    }

    /// Drop the slot guard and prune the key if the attempt is gone.
    fn finish(&self, slot: SlotGuard, phone: &str) {
        let removed = slot.is_none();
        drop(slot);
        if removed {
            self.registry.release(phone);
        }
    }
}

/// Remove the entry under the guard and release its client.
async fn discard(slot: &mut SlotGuard) {
    if let Some(entry) = slot.take() {
        entry.disconnect().await;
    }
}
