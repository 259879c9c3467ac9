//! Session lifecycle: login, single-flight token refresh, logout.
//!
//! [`SessionManager`] owns the only refresh slot in the process. The first
//! caller of [`SessionManager::ensure_fresh_token`] starts a refresh; every
//! caller that arrives while it is pending awaits the same shared future and
//! receives the same `Arc<Credential>` (or the same error). The refresh runs
//! on its own task, so it settles and empties the slot even when every
//! caller has gone away; the next demand then starts a new refresh.

mod interceptors;

pub use interceptors::{BearerAuth, RefreshOnUnauthorized};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::credential::CredentialStore;
use crate::error::{ClientResult, SessionError};
use crate::http::{ApiRequest, HttpClient};
use crate::models::auth::{
    Credential, LoginRequest, RefreshRequest, RegisterRequest, TokenEnvelope, UserProfile,
};

pub const LOGIN_PATH: &str = "/session/login";
pub const REGISTER_PATH: &str = "/session/register";
pub const REFRESH_PATH: &str = "/session/refresh";

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 16;

/// Session state changes, for the navigation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { email: String },
    Refreshed,
    /// The session could not be renewed and was cleared. Redirect to login.
    Expired { reason: SessionError },
    LoggedOut,
}

type RefreshResult = Result<Arc<Credential>, SessionError>;
type RefreshOperation = Shared<BoxFuture<'static, RefreshResult>>;

struct InFlight {
    generation: u64,
    operation: RefreshOperation,
}

/// Owns the credential lifecycle for one process.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    /// Interceptor-free client; session endpoints must never trigger a refresh.
    http: HttpClient,
    refresh_timeout: Duration,
    inflight: Arc<Mutex<Option<InFlight>>>,
    generation: AtomicU64,
    /// Serializes credential writes so read-modify-write updates cannot
    /// resurrect a superseded token pair.
    writes: Arc<Mutex<()>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, http: HttpClient, refresh_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            http,
            refresh_timeout,
            inflight: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            writes: Arc::new(Mutex::new(())),
            events,
        }
    }

    /// Latest stored credential. Never waits on a pending refresh.
    pub fn current(&self) -> Option<Arc<Credential>> {
        self.store.load()
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Whether a refresh is pending right now.
    pub fn is_refreshing(&self) -> bool {
        self.inflight.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Exchange the stored refresh token for a new credential, joining any
    /// refresh already in flight.
    ///
    /// Fails with [`SessionError::NoSession`] without touching the network
    /// when nothing is stored. On failure the store is cleared and one
    /// [`SessionEvent::Expired`] is broadcast per refresh operation.
    pub async fn ensure_fresh_token(&self) -> RefreshResult {
        let operation = {
            let mut slot = self
                .inflight
                .lock()
                .map_err(|_| SessionError::Storage("refresh slot poisoned".into()))?;
            match slot.as_ref() {
                Some(inflight) => {
                    debug!(generation = inflight.generation, "joining in-flight refresh");
                    inflight.operation.clone()
                }
                None => {
                    let current = self.store.load().ok_or(SessionError::NoSession)?;
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(generation, "starting refresh");
                    let operation = self.start_refresh(generation, current);
                    *slot = Some(InFlight {
                        generation,
                        operation: operation.clone(),
                    });
                    operation
                }
            }
        };
        operation.await
    }

    fn start_refresh(&self, generation: u64, current: Arc<Credential>) -> RefreshOperation {
        let http = self.http.clone();
        let store = Arc::clone(&self.store);
        let inflight = Arc::clone(&self.inflight);
        let writes = Arc::clone(&self.writes);
        let events = self.events.clone();
        let timeout = self.refresh_timeout;

        let task = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, exchange(&http, &current)).await {
                Ok(Ok(envelope)) => {
                    let _guard = writes.lock();
                    store.save(envelope.into()).map_err(SessionError::from)
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(SessionError::Timeout(timeout)),
            };

            match &outcome {
                Ok(fresh) => {
                    info!(generation, email = %fresh.profile.email, "session refreshed");
                    let _ = events.send(SessionEvent::Refreshed);
                }
                Err(e) => {
                    warn!(generation, error = %e, "refresh failed, clearing session");
                    let _guard = writes.lock();
                    if let Err(clear_err) = store.clear() {
                        warn!(error = %clear_err, "failed to clear credential store");
                    }
                    let _ = events.send(SessionEvent::Expired { reason: e.clone() });
                }
            }

            if let Ok(mut slot) = inflight.lock() {
                if slot.as_ref().is_some_and(|f| f.generation == generation) {
                    *slot = None;
                }
            }
            outcome
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(SessionError::TransientNetwork(format!("refresh task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    /// Sign in with email and password and store the issued credential.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Arc<Credential>> {
        let envelope: TokenEnvelope = self
            .http
            .post_json(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        self.establish(envelope)
    }

    /// Create an account and store the issued credential.
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<Arc<Credential>> {
        let envelope: TokenEnvelope = self.http.post_json(REGISTER_PATH, request).await?;
        self.establish(envelope)
    }

    fn establish(&self, envelope: TokenEnvelope) -> ClientResult<Arc<Credential>> {
        let credential = {
            let _guard = self.writes.lock();
            self.store.save(envelope.into()).map_err(SessionError::from)?
        };
        info!(email = %credential.profile.email, "session established");
        let _ = self.events.send(SessionEvent::LoggedIn {
            email: credential.profile.email.clone(),
        });
        Ok(credential)
    }

    /// Replace the stored profile wholesale, keeping the current tokens.
    pub fn replace_profile(&self, profile: UserProfile) -> RefreshResult {
        let _guard = self.writes.lock();
        let current = self.store.load().ok_or(SessionError::NoSession)?;
        Ok(self.store.save(current.with_profile(profile))?)
    }

    /// Clear the credential. Equivalent to expiry from the navigation
    /// layer's point of view.
    pub fn logout(&self) -> Result<(), SessionError> {
        {
            let _guard = self.writes.lock();
            self.store.clear()?;
        }
        info!("logged out");
        let _ = self.events.send(SessionEvent::LoggedOut);
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("signed_in", &self.store.is_signed_in())
            .field("refreshing", &self.is_refreshing())
            .field("refresh_timeout", &self.refresh_timeout)
            .finish()
    }
}

/// One call to the refresh endpoint. Any failure to get a 2xx response with
/// a full envelope ends the session.
async fn exchange(http: &HttpClient, current: &Credential) -> Result<TokenEnvelope, SessionError> {
    let body = RefreshRequest {
        email: &current.profile.email,
        refresh_token: &current.refresh_token,
    };
    let request = ApiRequest::post(REFRESH_PATH)
        .json(&body)
        .map_err(|e| SessionError::TransientNetwork(e.to_string()))?;
    let response = http
        .execute(request)
        .await
        .map_err(|e| SessionError::TransientNetwork(e.to_string()))?;

    let status = response.status.as_u16();
    if !response.is_success() {
        return Err(SessionError::RefreshRejected {
            status,
            message: response.text(),
        });
    }
    response
        .json::<TokenEnvelope>()
        .map_err(|e| SessionError::RefreshRejected {
            status,
            message: e.to_string(),
        })
}
