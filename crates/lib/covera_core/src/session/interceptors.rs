//! The two interceptors that connect [`HttpClient`](crate::http::HttpClient)
//! to the session.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::debug;

use super::SessionManager;
use crate::credential::CredentialStore;
use crate::error::ClientError;
use crate::http::{ApiRequest, ApiResponse, RequestInterceptor, ResponseAction, ResponseInterceptor};

/// Attaches `Authorization: Bearer <access token>` from the store.
///
/// Does nothing when signed out; anonymous requests are valid. Never
/// refreshes.
pub struct BearerAuth {
    store: Arc<dyn CredentialStore>,
}

impl BearerAuth {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RequestInterceptor for BearerAuth {
    async fn on_request(&self, request: &mut ApiRequest) -> Result<(), ClientError> {
        match self.store.load() {
            Some(credential) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", credential.access_token))
                    .map_err(|e| {
                        ClientError::InvalidRequest(format!("Invalid access token format: {e}"))
                    })?;
                request.headers.insert(AUTHORIZATION, value);
            }
            None => {
                request.headers.remove(AUTHORIZATION);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "BearerAuth"
    }
}

/// On a 401, refresh the session once and ask for the request to be
/// re-issued. A re-issued request that fails with 401 again is returned to
/// the caller as is.
pub struct RefreshOnUnauthorized {
    session: Arc<SessionManager>,
}

impl RefreshOnUnauthorized {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

fn bearer_token(request: &ApiRequest) -> Option<&str> {
    request
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[async_trait]
impl ResponseInterceptor for RefreshOnUnauthorized {
    async fn on_response(
        &self,
        request: &ApiRequest,
        response: &ApiResponse,
    ) -> Result<ResponseAction, ClientError> {
        if !response.is_unauthorized() {
            return Ok(ResponseAction::Continue);
        }
        if request.is_retry() {
            debug!(path = %request.path, "unauthorized after retry, giving up");
            return Ok(ResponseAction::Continue);
        }

        // The store already moved on from the token this request carried:
        // another caller refreshed in the meantime, so just resend.
        if let Some(current) = self.session.current() {
            if bearer_token(request) != Some(current.access_token.as_str()) {
                debug!(path = %request.path, "token superseded, resending");
                return Ok(ResponseAction::Retry);
            }
        }

        self.session.ensure_fresh_token().await?;
        Ok(ResponseAction::Retry)
    }

    fn name(&self) -> &str {
        "RefreshOnUnauthorized"
    }
}
