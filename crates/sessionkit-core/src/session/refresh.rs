use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{Session, SessionState};
use crate::api::{AuthError, AuthGateway};
use crate::auth::TokenStore;
use crate::models::TokenPair;

type RefreshFlight = Shared<BoxFuture<'static, Result<TokenPair, AuthError>>>;

/// Process-wide single-flight token refresh.
///
/// Overlapping callers share one gateway call and all observe its
/// outcome. The flight persists a new pair on success and clears the
/// store on any failure other than an unreachable server.
///
/// Ending the session bumps a generation counter; a flight that started
/// under an older generation never writes tokens back.
#[derive(Clone)]
pub struct TokenRefresher {
    inner: Arc<RefresherInner>,
}

struct RefresherInner {
    gateway: Arc<dyn AuthGateway>,
    store: Arc<dyn TokenStore>,
    session: Arc<watch::Sender<Session>>,
    in_flight: Mutex<Option<RefreshFlight>>,
    /// Bumped on logout. Guards every store write made by a flight.
    generation: Mutex<u64>,
}

impl TokenRefresher {
    pub(crate) fn new(
        gateway: Arc<dyn AuthGateway>,
        store: Arc<dyn TokenStore>,
        session: Arc<watch::Sender<Session>>,
    ) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                gateway,
                store,
                session,
                in_flight: Mutex::new(None),
                generation: Mutex::new(0),
            }),
        }
    }

    /// Exchange `refresh_token` for a new pair, or join the refresh that
    /// is already running (in which case `refresh_token` is ignored).
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let flight = self.join_or_start(refresh_token);
        let outcome = flight.await;

        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|f| f.peek().is_some()) {
            *slot = None;
        }
        outcome
    }

    /// True while a refresh started by some caller has not resolved.
    pub fn is_refreshing(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|f| f.peek().is_none())
    }

    /// Clear the store and orphan any running refresh so its result is
    /// discarded instead of persisted.
    pub(crate) fn end_session(&self) {
        // Same lock order as join_or_start: slot, then generation
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut generation = self
            .inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        *slot = None;
        self.inner.store.clear();
    }

    fn join_or_start(&self, refresh_token: &str) -> RefreshFlight {
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(flight) = slot.as_ref().filter(|f| f.peek().is_none()) {
            debug!("Joining in-flight token refresh");
            return flight.clone();
        }

        let started = *self
            .inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let flight = Self::run(Arc::clone(&self.inner), refresh_token.to_string(), started)
            .boxed()
            .shared();
        *slot = Some(flight.clone());
        flight
    }

    async fn run(
        inner: Arc<RefresherInner>,
        refresh_token: String,
        started: u64,
    ) -> Result<TokenPair, AuthError> {
        debug!("Refreshing access token");
        let outcome = inner.gateway.refresh(&refresh_token).await;

        let generation = inner.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *generation != started {
            debug!("Session ended while refreshing, discarding result");
            return Err(AuthError::RefreshRejected);
        }

        match outcome {
            Ok(tokens) => {
                inner.store.set(&tokens);
                debug!("Access token refreshed");
                Ok(tokens)
            }
            Err(e) if e.is_network() => {
                // Server unreachable: the refresh token may still be good
                warn!(error = %e, "Token refresh failed");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                inner.store.clear();
                inner.session.send_if_modified(|session| {
                    if matches!(session.state, SessionState::Authenticated(_)) {
                        session.state = SessionState::Unauthenticated;
                        true
                    } else {
                        false
                    }
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::testing::{test_user, FakeGateway};
    use std::time::Duration;

    fn refresher(
        gateway: Arc<FakeGateway>,
        store: Arc<MemoryTokenStore>,
        state: SessionState,
    ) -> (TokenRefresher, Arc<watch::Sender<Session>>) {
        let (tx, _rx) = watch::channel(Session {
            state,
            loading: false,
        });
        let tx = Arc::new(tx);
        (TokenRefresher::new(gateway, store, Arc::clone(&tx)), tx)
    }

    #[tokio::test]
    async fn test_refresh_persists_new_pair() {
        let gateway = Arc::new(FakeGateway::new().with_refresh(Ok(TokenPair::new("a2", "r2"))));
        let store = Arc::new(MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")));
        let (refresher, _tx) = refresher(gateway.clone(), store.clone(), SessionState::Unauthenticated);

        let tokens = refresher.refresh("r1").await.expect("refresh succeeds");
        assert_eq!(tokens, TokenPair::new("a2", "r2"));
        assert_eq!(store.get(), Some(TokenPair::new("a2", "r2")));
        assert!(!refresher.is_refreshing());
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_store_and_session() {
        let gateway = Arc::new(FakeGateway::new().with_refresh(Err(AuthError::RefreshRejected)));
        let store = Arc::new(MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")));
        let (refresher, tx) = refresher(
            gateway,
            store.clone(),
            SessionState::Authenticated(test_user("1", "admin")),
        );

        assert_eq!(refresher.refresh("r1").await, Err(AuthError::RefreshRejected));
        assert!(store.get().is_none());
        assert_eq!(tx.borrow().state, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_network_failure_keeps_tokens() {
        let gateway = Arc::new(
            FakeGateway::new().with_refresh(Err(AuthError::Network("timeout".to_string()))),
        );
        let store = Arc::new(MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")));
        let (refresher, _tx) = refresher(gateway, store.clone(), SessionState::Unauthenticated);

        assert!(refresher.refresh("r1").await.unwrap_err().is_network());
        assert_eq!(store.get(), Some(TokenPair::new("a1", "r1")));
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_share_one_call() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_refresh(Ok(TokenPair::new("a2", "r2")))
                .with_refresh_delay(Duration::from_millis(20)),
        );
        let store = Arc::new(MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")));
        let (refresher, _tx) = refresher(gateway.clone(), store, SessionState::Unauthenticated);

        let (first, second, third) = tokio::join!(
            refresher.refresh("r1"),
            refresher.refresh("r1"),
            refresher.refresh("r1"),
        );

        assert_eq!(FakeGateway::calls(&gateway.refresh_calls), 1);
        assert_eq!(first, Ok(TokenPair::new("a2", "r2")));
        assert_eq!(second, first);
        assert_eq!(third, first);
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_reach_gateway() {
        let gateway = Arc::new(FakeGateway::new().with_refresh(Ok(TokenPair::new("a2", "r2"))));
        let store = Arc::new(MemoryTokenStore::new());
        let (refresher, _tx) = refresher(gateway.clone(), store, SessionState::Unauthenticated);

        refresher.refresh("r1").await.expect("first refresh");
        refresher.refresh("r2").await.expect("second refresh");
        assert_eq!(FakeGateway::calls(&gateway.refresh_calls), 2);
    }

    #[tokio::test]
    async fn test_server_failure_clears_store() {
        let gateway = Arc::new(
            FakeGateway::new().with_refresh(Err(AuthError::Server("unavailable".to_string()))),
        );
        let store = Arc::new(MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")));
        let (refresher, tx) = refresher(
            gateway,
            store.clone(),
            SessionState::Authenticated(test_user("1", "admin")),
        );

        assert!(matches!(refresher.refresh("r1").await, Err(AuthError::Server(_))));
        assert!(store.get().is_none());
        assert_eq!(tx.borrow().state, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_end_session_discards_in_flight_result() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_refresh(Ok(TokenPair::new("a2", "r2")))
                .with_refresh_delay(Duration::from_millis(40)),
        );
        let store = Arc::new(MemoryTokenStore::with_tokens(TokenPair::new("a1", "r1")));
        let (refresher, _tx) = refresher(gateway.clone(), store.clone(), SessionState::Unauthenticated);

        let (outcome, ()) = tokio::join!(refresher.refresh("r1"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            refresher.end_session();
        });

        assert_eq!(outcome, Err(AuthError::RefreshRejected));
        assert!(store.get().is_none());
        assert!(!refresher.is_refreshing());

        // A new session refreshes normally again
        store.set(&TokenPair::new("a3", "r3"));
        assert_eq!(refresher.refresh("r3").await, Ok(TokenPair::new("a2", "r2")));
        assert_eq!(store.get(), Some(TokenPair::new("a2", "r2")));
        assert_eq!(FakeGateway::calls(&gateway.refresh_calls), 2);
    }
}
