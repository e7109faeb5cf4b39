// Mock implementations of the remote auth capability for tests.
//
// Replies are scripted as queues; an empty queue falls back to a success
// default so happy-path tests stay short.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use telegram_auth::{
    AuthClient, AuthConnector, AuthIdentity, ProxyConfig, SentCode, SignInOutcome,
    TelegramAuthError,
};

#[derive(Default)]
struct MockScript {
    connect: VecDeque<TelegramAuthError>,
    request_code: VecDeque<Result<SentCode, TelegramAuthError>>,
    submit_code: VecDeque<Result<SignInOutcome, TelegramAuthError>>,
    submit_password: VecDeque<Result<(), TelegramAuthError>>,
    identity: Option<AuthIdentity>,
    issued_tokens: usize,
}

pub struct MockAuthConnector {
    script: Arc<Mutex<MockScript>>,
    connects: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl MockAuthConnector {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(MockScript::default())),
            connects: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Total connect calls that succeeded.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Clients currently connected (connected minus disconnected).
    pub fn live_clients(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn fail_next_connect(&self, err: TelegramAuthError) {
        self.script.lock().unwrap().connect.push_back(err);
    }

    pub fn queue_request_code(&self, reply: Result<SentCode, TelegramAuthError>) {
        self.script.lock().unwrap().request_code.push_back(reply);
    }

    pub fn queue_submit_code(&self, reply: Result<SignInOutcome, TelegramAuthError>) {
        self.script.lock().unwrap().submit_code.push_back(reply);
    }

    pub fn queue_submit_password(&self, reply: Result<(), TelegramAuthError>) {
        self.script.lock().unwrap().submit_password.push_back(reply);
    }

    pub fn set_identity(&self, identity: AuthIdentity) {
        self.script.lock().unwrap().identity = Some(identity);
    }
}

impl Default for MockAuthConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthConnector for MockAuthConnector {
    async fn connect(
        &self,
        _phone_number: &str,
        _proxy: Option<&ProxyConfig>,
    ) -> Result<Box<dyn AuthClient>, TelegramAuthError> {
        if let Some(err) = self.script.lock().unwrap().connect.pop_front() {
            return Err(err);
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockAuthClient {
            script: self.script.clone(),
            live: self.live.clone(),
            disconnected: false,
        }))
    }
}

pub struct MockAuthClient {
    script: Arc<Mutex<MockScript>>,
    live: Arc<AtomicUsize>,
    disconnected: bool,
}

#[async_trait]
impl AuthClient for MockAuthClient {
    async fn request_code(&mut self, _phone_number: &str) -> Result<SentCode, TelegramAuthError> {
        let mut script = self.script.lock().unwrap();
        match script.request_code.pop_front() {
            Some(reply) => reply,
            None => {
                script.issued_tokens += 1;
                Ok(SentCode {
                    verification_token: format!("code-hash-{}", script.issued_tokens),
                    resend_timeout_seconds: 120,
                })
            }
        }
    }

    async fn submit_code(
        &mut self,
        _phone_number: &str,
        _verification_token: &str,
        _code: &str,
    ) -> Result<SignInOutcome, TelegramAuthError> {
        self.script
            .lock()
            .unwrap()
            .submit_code
            .pop_front()
            .unwrap_or(Ok(SignInOutcome::Authenticated))
    }

    async fn submit_password(&mut self, _password: &str) -> Result<(), TelegramAuthError> {
        self.script
            .lock()
            .unwrap()
            .submit_password
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn fetch_identity(&mut self) -> Result<AuthIdentity, TelegramAuthError> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .identity
            .clone()
            .unwrap_or(AuthIdentity {
                remote_user_id: 42,
                display_name: "Ana".to_string(),
                handle: Some("ana".to_string()),
            }))
    }

    async fn disconnect(&mut self) {
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
