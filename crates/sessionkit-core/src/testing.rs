//! Test doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::{ApiRequest, ApiResponse, AuthError, AuthGateway, Transport};
use crate::models::{AuthSession, Credentials, TokenPair, User};

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, AuthError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, status: StatusCode, body: impl Into<Vec<u8>>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(ApiResponse::new(status, body)));
    }

    pub fn push_network_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(AuthError::Network(message.to_string())));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::Network("no scripted response".to_string())))
    }
}

/// Answers 200 only for requests carrying the currently valid bearer
/// token, 401 otherwise.
pub struct BearerCheckTransport {
    valid_token: String,
    requests: Mutex<Vec<ApiRequest>>,
}

impl BearerCheckTransport {
    pub fn new(valid_token: &str) -> Self {
        Self {
            valid_token: valid_token.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.requests()
            .iter()
            .map(|r| r.authorization().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for BearerCheckTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let expected = format!("Bearer {}", self.valid_token);
        let authorized = request.authorization() == Some(expected.as_str());
        self.requests.lock().unwrap().push(request);

        Ok(if authorized {
            ApiResponse::new(StatusCode::OK, r#"{"ok": true}"#)
        } else {
            ApiResponse::new(StatusCode::UNAUTHORIZED, "token expired")
        })
    }
}

pub fn test_user(id: &str, username: &str) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        created_at: "2024-05-01T12:00:00Z".parse().unwrap(),
    }
}

/// In-process stand-in for the authentication server.
pub struct FakeGateway {
    accounts: Mutex<HashMap<String, (String, User)>>,
    /// access token -> user
    sessions: Mutex<HashMap<String, User>>,
    refresh_outcome: Mutex<Result<TokenPair, AuthError>>,
    refresh_delay: Duration,
    lookup_delay: Duration,
    logout_outcome: Mutex<Result<(), AuthError>>,
    next_token: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub current_user_calls: AtomicUsize,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            refresh_outcome: Mutex::new(Err(AuthError::RefreshRejected)),
            refresh_delay: Duration::ZERO,
            lookup_delay: Duration::ZERO,
            logout_outcome: Mutex::new(Ok(())),
            next_token: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            current_user_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account; each login issues a fresh token for both roles.
    pub fn with_account(self, username: &str, password: &str, user: User) -> Self {
        self.accounts
            .lock()
            .unwrap()
            .insert(username.to_string(), (password.to_string(), user));
        self
    }

    /// Accept `access_token` on the current-user endpoint.
    pub fn with_session(self, access_token: &str, user: User) -> Self {
        self.sessions
            .lock()
            .unwrap()
            .insert(access_token.to_string(), user);
        self
    }

    pub fn with_refresh(self, outcome: Result<TokenPair, AuthError>) -> Self {
        *self.refresh_outcome.lock().unwrap() = outcome;
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    pub fn with_logout(self, outcome: Result<(), AuthError>) -> Self {
        *self.logout_outcome.lock().unwrap() = outcome;
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn issue_token(&self) -> String {
        format!("T{}", self.next_token.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl AuthGateway for FakeGateway {
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let user = match self.accounts.lock().unwrap().get(&credentials.username) {
            Some((password, user)) if *password == credentials.password => user.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };
        let token = self.issue_token();
        self.sessions
            .lock()
            .unwrap()
            .insert(token.clone(), user.clone());
        Ok(AuthSession {
            tokens: TokenPair::single(token),
            user,
        })
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&credentials.username) {
            return Err(AuthError::RegistrationFailed(
                "Username already exists".to_string(),
            ));
        }
        let user = test_user(&(accounts.len() + 1).to_string(), &credentials.username);
        accounts.insert(
            credentials.username.clone(),
            (credentials.password.clone(), user.clone()),
        );
        drop(accounts);

        let access = self.issue_token();
        let refresh = self.issue_token();
        self.sessions
            .lock()
            .unwrap()
            .insert(access.clone(), user.clone());
        Ok(AuthSession {
            tokens: TokenPair::new(access, refresh),
            user,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        self.refresh_outcome.lock().unwrap().clone()
    }

    async fn logout(&self, _refresh_token: &str) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_outcome.lock().unwrap().clone()
    }

    async fn current_user(&self, access_token: &str) -> Result<User, AuthError> {
        self.current_user_calls.fetch_add(1, Ordering::SeqCst);
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        self.sessions
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}
