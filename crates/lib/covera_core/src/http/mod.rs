//! HTTP client with interceptor hooks.
//!
//! [`HttpClient`] resolves paths against a base URL, applies default
//! headers, runs the [`RequestInterceptor`] chain, sends through a
//! [`Transport`], then lets [`ResponseInterceptor`]s decide whether the
//! request is re-issued. A request is re-issued at most
//! [`MAX_RETRIES`] times no matter what the interceptors ask for.

mod interceptor;
mod transport;

pub use interceptor::{RequestInterceptor, ResponseAction, ResponseInterceptor};
pub use transport::{PreparedRequest, ReqwestTransport, Transport};

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Upper bound on re-issues of one logical request.
pub const MAX_RETRIES: u32 = 1;

/// A logical request, before base URL resolution and interceptors.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the client's base URL, e.g. `/packages/7`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    attempt: u32,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            attempt: 0,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ClientResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// How many times this request has already been re-issued.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether this is a re-issue of an earlier attempt.
    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }
}

/// Raw response: status, headers and body bytes.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Body as lossy UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ClientError::Decode(format!("{} (status {})", e, self.status.as_u16()))
        })
    }

    /// Turn non-2xx responses into errors.
    pub fn error_for_status(self) -> ClientResult<Self> {
        if self.is_success() {
            Ok(self)
        } else if self.is_unauthorized() {
            Err(ClientError::Unauthorized)
        } else {
            Err(ClientError::Http {
                status: self.status.as_u16(),
                body: self.text(),
            })
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    default_headers: HeaderMap,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

/// Configured request sender. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field(
                "request_interceptors",
                &self
                    .inner
                    .request_interceptors
                    .iter()
                    .map(|i| i.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field(
                "response_interceptors",
                &self
                    .inner
                    .response_interceptors
                    .iter()
                    .map(|i| i.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl HttpClient {
    pub fn builder(base_url: &str, transport: Arc<dyn Transport>) -> HttpClientBuilder {
        HttpClientBuilder {
            base_url: base_url.to_string(),
            transport,
            default_headers: HeaderMap::new(),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// A client sharing this one's transport, base URL and default headers,
    /// with the given interceptors in place of the current ones.
    pub fn with_interceptors(
        &self,
        request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
        response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    ) -> HttpClient {
        HttpClient {
            inner: Arc::new(Inner {
                transport: Arc::clone(&self.inner.transport),
                base_url: self.inner.base_url.clone(),
                default_headers: self.inner.default_headers.clone(),
                request_interceptors,
                response_interceptors,
            }),
        }
    }

    /// Send a request through the interceptor chain.
    ///
    /// Returns the final response regardless of status; use
    /// [`ApiResponse::error_for_status`] or the typed helpers to map errors.
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let mut request = request;
        loop {
            let mut outgoing = request.clone();
            for interceptor in &self.inner.request_interceptors {
                interceptor.on_request(&mut outgoing).await?;
            }

            let prepared = self.prepare(&outgoing)?;
            let response = self.inner.transport.send(prepared).await?;

            let mut action = ResponseAction::Continue;
            for interceptor in &self.inner.response_interceptors {
                if interceptor.on_response(&outgoing, &response).await? == ResponseAction::Retry {
                    action = ResponseAction::Retry;
                    break;
                }
            }

            match action {
                ResponseAction::Retry if request.attempt < MAX_RETRIES => {
                    request.attempt += 1;
                    debug!(
                        method = %request.method,
                        path = %request.path,
                        attempt = request.attempt,
                        "re-issuing request"
                    );
                }
                ResponseAction::Retry => {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        "retry limit reached, returning response"
                    );
                    return Ok(response);
                }
                ResponseAction::Continue => return Ok(response),
            }
        }
    }

    /// Execute, require 2xx, ignore the body.
    pub async fn send_checked(&self, request: ApiRequest) -> ClientResult<()> {
        self.execute(request).await?.error_for_status()?;
        Ok(())
    }

    /// Execute, require 2xx, decode the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        self.execute(request).await?.error_for_status()?.json()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::put(path).json(body)?).await
    }

    fn prepare(&self, request: &ApiRequest) -> ClientResult<PreparedRequest> {
        let mut url = join_url(&self.inner.base_url, &request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }

        let mut headers = self.inner.default_headers.clone();
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        let body = match &request.body {
            Some(value) => {
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
                Some(serde_json::to_vec(value)?)
            }
            None => None,
        };

        Ok(PreparedRequest {
            method: request.method.clone(),
            url,
            headers,
            body,
        })
    }
}

fn join_url(base: &Url, path: &str) -> ClientResult<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ClientError::InvalidRequest(format!("{joined}: {e}")))
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    base_url: String,
    transport: Arc<dyn Transport>,
    default_headers: HeaderMap,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl HttpClientBuilder {
    pub fn default_header(mut self, name: &'static str, value: &str) -> ClientResult<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::InvalidRequest(format!("header {name}: {e}")))?;
        self.default_headers
            .insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    #[must_use]
    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    #[must_use]
    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> ClientResult<HttpClient> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("base URL {}: {e}", self.base_url)))?;
        Ok(HttpClient {
            inner: Arc::new(Inner {
                transport: self.transport,
                base_url,
                default_headers: self.default_headers,
                request_interceptors: self.request_interceptors,
                response_interceptors: self.response_interceptors,
            }),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-process transport for unit tests.

    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Canned reply for one request.
    pub(crate) struct MockReply {
        pub status: u16,
        pub body: serde_json::Value,
        pub delay: Duration,
    }

    impl MockReply {
        pub fn ok(body: serde_json::Value) -> Self {
            Self {
                status: 200,
                body,
                delay: Duration::ZERO,
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                body: serde_json::json!({ "error": "scripted" }),
                delay: Duration::ZERO,
            }
        }

        pub fn after(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    type Handler = Box<dyn Fn(&PreparedRequest) -> Result<MockReply, ClientError> + Send + Sync>;

    /// Transport that answers from a closure and records every request.
    pub(crate) struct MockTransport {
        handler: Handler,
        calls: Mutex<Vec<PreparedRequest>>,
    }

    impl MockTransport {
        pub fn new<F>(handler: F) -> Arc<Self>
        where
            F: Fn(&PreparedRequest) -> Result<MockReply, ClientError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> Vec<PreparedRequest> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of recorded requests whose path ends with `suffix`.
        pub fn count(&self, suffix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url.path().ends_with(suffix))
                .count()
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: PreparedRequest) -> ClientResult<ApiResponse> {
            self.calls.lock().unwrap().push(request.clone());
            let reply = (self.handler)(&request)?;
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            Ok(ApiResponse {
                status: StatusCode::from_u16(reply.status).unwrap(),
                headers: HeaderMap::new(),
                body: serde_json::to_vec(&reply.body).unwrap(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use reqwest::header::AUTHORIZATION;

    use super::testing::{MockReply, MockTransport};
    use super::*;

    struct StaticHeader;

    #[async_trait]
    impl RequestInterceptor for StaticHeader {
        async fn on_request(&self, request: &mut ApiRequest) -> Result<(), ClientError> {
            let value = format!("attempt-{}", request.attempt());
            request
                .headers
                .insert(AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
            Ok(())
        }

        fn name(&self) -> &str {
            "StaticHeader"
        }
    }

    /// Always asks for a retry and counts how often it was consulted.
    struct AlwaysRetry(AtomicU32);

    #[async_trait]
    impl ResponseInterceptor for AlwaysRetry {
        async fn on_response(
            &self,
            _request: &ApiRequest,
            _response: &ApiResponse,
        ) -> Result<ResponseAction, ClientError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ResponseAction::Retry)
        }

        fn name(&self) -> &str {
            "AlwaysRetry"
        }
    }

    #[tokio::test]
    async fn resolves_path_query_and_default_headers() {
        let transport = MockTransport::new(|_| Ok(MockReply::ok(serde_json::json!({"ok": true}))));
        let client = HttpClient::builder("http://api.test/v1/", transport.clone())
            .default_header("x-client", "covera")
            .unwrap()
            .build()
            .unwrap();

        let req = ApiRequest::post("/packages/7")
            .query("expand", "applications")
            .json(&serde_json::json!({"a": 1}))
            .unwrap();
        let body: serde_json::Value = client.send_json(req).await.unwrap();
        assert_eq!(body["ok"], true);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].url.as_str(),
            "http://api.test/v1/packages/7?expand=applications"
        );
        assert_eq!(calls[0].headers["x-client"], "covera");
        assert_eq!(calls[0].headers[CONTENT_TYPE], "application/json");
        assert_eq!(calls[0].body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
    }

    #[tokio::test]
    async fn retry_is_capped_and_interceptors_rerun() {
        let transport = MockTransport::new(|_| Ok(MockReply::status(401)));
        let retry = Arc::new(AlwaysRetry(AtomicU32::new(0)));
        let client = HttpClient::builder("http://api.test", transport.clone())
            .request_interceptor(Arc::new(StaticHeader))
            .response_interceptor(retry.clone())
            .build()
            .unwrap();

        let resp = client.execute(ApiRequest::get("/x")).await.unwrap();
        assert!(resp.is_unauthorized());
        assert_eq!(transport.count("/x"), 2);
        assert_eq!(retry.0.load(Ordering::SeqCst), 2);

        let calls = transport.calls();
        assert_eq!(calls[0].headers[AUTHORIZATION], "attempt-0");
        assert_eq!(calls[1].headers[AUTHORIZATION], "attempt-1");
    }

    #[tokio::test]
    async fn error_for_status_maps_statuses() {
        let transport = MockTransport::new(|req| {
            Ok(match req.url.path() {
                "/missing" => MockReply::status(404),
                "/denied" => MockReply::status(401),
                _ => MockReply::ok(serde_json::json!([])),
            })
        });
        let client = HttpClient::builder("http://api.test", transport)
            .build()
            .unwrap();

        assert!(matches!(
            client.get_json::<serde_json::Value>("/missing").await,
            Err(ClientError::Http { status: 404, .. })
        ));
        assert!(matches!(
            client.get_json::<serde_json::Value>("/denied").await,
            Err(ClientError::Unauthorized)
        ));
        assert!(client.get_json::<Vec<u32>>("/ok").await.unwrap().is_empty());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let transport = MockTransport::new(|_| Ok(MockReply::status(200)));
        assert!(matches!(
            HttpClient::builder("not a url", transport).build(),
            Err(ClientError::InvalidRequest(_))
        ));
    }
}
