//! Interceptor hooks around every request.
//!
//! Request interceptors run in registration order on each attempt, so a
//! retried request picks up whatever they attach at that moment (e.g. a
//! freshly refreshed token). Response interceptors inspect the result and
//! may ask the client to issue the same request once more.

use async_trait::async_trait;

use super::{ApiRequest, ApiResponse};
use crate::error::ClientError;

/// What the client should do with a response after an interceptor saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    /// Hand the response to the next interceptor, then to the caller.
    Continue,
    /// Re-issue the same request.
    Retry,
}

/// Mutates outgoing requests (headers, query) before they hit the wire.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn on_request(&self, request: &mut ApiRequest) -> Result<(), ClientError>;

    fn name(&self) -> &str;
}

/// Reacts to incoming responses.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    /// `request` is the attempt exactly as sent, headers included.
    /// Return `Err` to fail the call, `Retry` to re-issue it.
    async fn on_response(
        &self,
        request: &ApiRequest,
        response: &ApiResponse,
    ) -> Result<ResponseAction, ClientError>;

    fn name(&self) -> &str;
}
