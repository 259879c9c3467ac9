//! Process-wide entry point.
//!
//! [`CoveraClient`] builds the transport, credential store, session manager,
//! authenticated HTTP client and aggregation engine exactly once and hands
//! out references to them.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::aggregation::{AggregationEngine, AggregationError, ApiPortfolioSource};
use crate::config::ClientConfig;
use crate::credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use crate::error::{ClientError, ClientResult};
use crate::http::{HttpClient, RequestInterceptor, ReqwestTransport, ResponseInterceptor, Transport};
use crate::models::auth::{Credential, RegisterRequest, UserProfile};
use crate::session::{BearerAuth, RefreshOnUnauthorized, SessionEvent, SessionManager};
use crate::view::{PackageView, Portfolio};

pub const PROFILE_PATH: &str = "/session/profile";

/// Header identifying this client to the backend.
const CLIENT_HEADER: &str = "x-covera-client";

pub struct CoveraClient {
    config: ClientConfig,
    session: Arc<SessionManager>,
    http: HttpClient,
    engine: AggregationEngine<ApiPortfolioSource>,
}

impl CoveraClient {
    /// Build the client graph from configuration, using reqwest and the
    /// configured credential store.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        let store: Arc<dyn CredentialStore> = match &config.credentials_path {
            Some(path) => Arc::new(FileCredentialStore::open(path)),
            None => Arc::new(MemoryCredentialStore::new()),
        };
        Self::with_parts(config, transport, store)
    }

    /// Build the client graph around a given transport and store.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> ClientResult<Self> {
        let plain = HttpClient::builder(&config.api_url, transport)
            .default_header(CLIENT_HEADER, concat!("covera_core/", env!("CARGO_PKG_VERSION")))?
            .build()?;
        let session = Arc::new(SessionManager::new(
            Arc::clone(&store),
            plain.clone(),
            config.refresh_timeout,
        ));
        let request_interceptors: Vec<Arc<dyn RequestInterceptor>> =
            vec![Arc::new(BearerAuth::new(store))];
        let response_interceptors: Vec<Arc<dyn ResponseInterceptor>> =
            vec![Arc::new(RefreshOnUnauthorized::new(Arc::clone(&session)))];
        let http = plain.with_interceptors(request_interceptors, response_interceptors);
        let engine = AggregationEngine::new(ApiPortfolioSource::new(http.clone()));

        debug!(api_url = %config.api_url, durable = config.credentials_path.is_some(), "client ready");
        Ok(Self {
            config,
            session,
            http,
            engine,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Authenticated client: bearer token attached, 401s refreshed once.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    pub fn current(&self) -> Option<Arc<Credential>> {
        self.session.current()
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Arc<Credential>> {
        self.session.login(email, password).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<Arc<Credential>> {
        self.session.register(request).await
    }

    pub fn logout(&self) -> ClientResult<()> {
        Ok(self.session.logout()?)
    }

    /// Send the profile to the backend and store what it returns in place of
    /// the current one.
    pub async fn update_profile(&self, profile: &UserProfile) -> ClientResult<Arc<Credential>> {
        let updated: UserProfile = self.http.put_json(PROFILE_PATH, profile).await?;
        Ok(self.session.replace_profile(updated)?)
    }

    /// One aggregation pass.
    pub async fn dashboard(&self) -> Result<Portfolio, AggregationError> {
        self.engine.aggregate().await
    }

    /// Pay a package if its current view allows it, then return a fresh
    /// portfolio.
    pub async fn pay_package(&self, id: &str) -> ClientResult<Portfolio> {
        let portfolio = self.engine.aggregate().await?;
        let package = find_package(&portfolio, id)?;
        if !package.can_pay {
            return Err(ClientError::ActionNotAllowed(format!(
                "package {id} cannot be paid in status {:?}",
                package.status
            )));
        }
        self.engine.source().pay_package(id).await?;
        info!(package = id, "package paid");
        Ok(self.engine.aggregate().await?)
    }

    /// Cancel a package, then return a fresh portfolio.
    pub async fn cancel_package(&self, id: &str) -> ClientResult<Portfolio> {
        let portfolio = self.engine.aggregate().await?;
        let package = find_package(&portfolio, id)?;
        if !package.can_cancel {
            return Err(ClientError::ActionNotAllowed(format!(
                "package {id} cannot be cancelled"
            )));
        }
        self.engine.source().cancel_package(id).await?;
        info!(package = id, "package cancelled");
        Ok(self.engine.aggregate().await?)
    }
}

fn find_package<'a>(portfolio: &'a Portfolio, id: &str) -> ClientResult<&'a PackageView> {
    portfolio
        .package(id)
        .ok_or_else(|| ClientError::InvalidRequest(format!("unknown package {id}")))
}

impl From<AggregationError> for ClientError {
    fn from(e: AggregationError) -> Self {
        match e {
            AggregationError::SummaryList(inner) => inner,
        }
    }
}

impl std::fmt::Debug for CoveraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoveraClient")
            .field("api_url", &self.config.api_url)
            .field("session", &self.session)
            .finish()
    }
}
