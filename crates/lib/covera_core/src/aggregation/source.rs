//! [`PortfolioSource`] backed by the REST API.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{ApplicationCategory, PackageDetail, PortfolioSource};
use crate::error::{ClientError, ClientResult};
use crate::http::{ApiRequest, HttpClient};
use crate::models::portfolio::{PackageSummary, RawApplication};

pub const PACKAGE_LIST_PATH: &str = "/packages/summary-list";

/// Reads packages and applications through an authenticated [`HttpClient`]
/// and issues package actions.
#[derive(Debug, Clone)]
pub struct ApiPortfolioSource {
    http: HttpClient,
}

impl ApiPortfolioSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn pay_package(&self, id: &str) -> ClientResult<()> {
        let path = format!("{}/pay", package_path(id)?);
        debug!(package = id, "paying package");
        self.http.send_checked(ApiRequest::post(path)).await
    }

    pub async fn cancel_package(&self, id: &str) -> ClientResult<()> {
        let path = format!("{}/cancel", package_path(id)?);
        debug!(package = id, "cancelling package");
        self.http.send_checked(ApiRequest::post(path)).await
    }
}

/// `/packages/{id}`. Ids are opaque but must be a single path segment.
fn package_path(id: &str) -> ClientResult<String> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
    if !valid || id == "." || id == ".." {
        return Err(ClientError::InvalidRequest(format!("invalid package id: {id:?}")));
    }
    Ok(format!("/packages/{id}"))
}

#[async_trait]
impl PortfolioSource for ApiPortfolioSource {
    async fn package_summaries(&self) -> ClientResult<Vec<PackageSummary>> {
        self.http.get_json(PACKAGE_LIST_PATH).await
    }

    async fn package_detail(&self, id: &str) -> ClientResult<Value> {
        self.http.get_json(&package_path(id)?).await
    }

    async fn applications(&self, category: ApplicationCategory) -> ClientResult<Vec<RawApplication>> {
        let path = format!("/applications/{}", category.slug());
        let payload: Value = self.http.get_json(&path).await?;
        // Listings come back either bare or wrapped like a package detail.
        Ok(match payload.as_array() {
            Some(items) => RawApplication::collect(items),
            None => PackageDetail::from_value(&payload).into_applications(),
        })
    }
}
