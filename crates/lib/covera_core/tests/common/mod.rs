//! Mock backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use covera_core::credential::{CredentialStore, MemoryCredentialStore};
use covera_core::models::auth::{Credential, UserProfile};

/// How `/session/refresh` answers.
#[derive(Clone, Copy)]
pub enum RefreshBehavior {
    /// Issue the next token pair after the delay.
    Rotate { delay: Duration },
    /// Reject with the given status.
    Reject { status: u16 },
}

pub struct Backend {
    pub refresh: RefreshBehavior,
    /// Only this access token is accepted on data endpoints.
    pub valid_token: Mutex<String>,
    pub generation: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub hits: Mutex<HashMap<String, u32>>,
    pub summaries: Value,
    pub details: HashMap<String, Value>,
    pub listings: HashMap<String, Value>,
}

impl Backend {
    pub fn new(refresh: RefreshBehavior) -> Self {
        Self {
            refresh,
            valid_token: Mutex::new("access-1".into()),
            generation: AtomicU32::new(1),
            refresh_calls: AtomicU32::new(0),
            hits: Mutex::new(HashMap::new()),
            summaries: json!([]),
            details: HashMap::new(),
            listings: HashMap::new(),
        }
    }

    /// Tokens issued at login are already stale; every data call 401s until
    /// one refresh has happened.
    pub fn expire_current_token(self) -> Self {
        *self.valid_token.lock().unwrap() = "access-2".into();
        self
    }

    pub fn hits(&self, key: &str) -> u32 {
        self.hits.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn hit(&self, key: &str) {
        *self.hits.lock().unwrap().entry(key.to_string()).or_default() += 1;
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.valid_token.lock().unwrap());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

type Shared = Arc<Backend>;

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "token expired" }))).into_response()
}

async fn refresh(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    match backend.refresh {
        RefreshBehavior::Reject { status } => (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({ "error": "refresh token revoked" })),
        )
            .into_response(),
        RefreshBehavior::Rotate { delay } => {
            assert_eq!(body["email"], "ann@example.com");
            tokio::time::sleep(delay).await;
            let generation = backend.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let access = format!("access-{generation}");
            *backend.valid_token.lock().unwrap() = access.clone();
            Json(json!({
                "accessToken": access,
                "refreshToken": format!("refresh-{generation}"),
                "email": "ann@example.com",
                "firstName": "Ann",
                "lastName": "Lee",
                "role": "client",
                "level": "gold",
                "policyCount": 3
            }))
            .into_response()
        }
    }
}

async fn summary_list(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    backend.hit("summary-list");
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(backend.summaries.clone()).into_response()
}

async fn package_detail(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    backend.hit(&format!("detail:{id}"));
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    match backend.details.get(&id) {
        Some(detail) => Json(detail.clone()).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn applications(
    State(backend): State<Shared>,
    Path(category): Path<String>,
    headers: HeaderMap,
) -> Response {
    backend.hit(&format!("applications:{category}"));
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(backend.listings.get(&category).cloned().unwrap_or(json!([]))).into_response()
}

/// Serve `backend` on an ephemeral port; returns the API base URL.
pub async fn serve(backend: Shared) -> String {
    let app = Router::new()
        .route("/api/session/refresh", post(refresh))
        .route("/api/packages/summary-list", get(summary_list))
        .route("/api/packages/{id}", get(package_detail))
        .route("/api/applications/{category}", get(applications))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

pub fn signed_in_store() -> Arc<dyn CredentialStore> {
    Arc::new(MemoryCredentialStore::with_credential(Credential {
        access_token: "access-1".into(),
        refresh_token: "refresh-1".into(),
        profile: UserProfile {
            email: "ann@example.com".into(),
            first_name: "Ann".into(),
            ..Default::default()
        },
    }))
}
