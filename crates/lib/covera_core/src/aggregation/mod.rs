//! Portfolio aggregation.
//!
//! One pass fetches the package summary list, resolves each package's
//! applications (embedded, else from the detail endpoint), lists every
//! fetchable category for standalone policies, and assembles a
//! [`Portfolio`]. Only the summary list can fail a pass; everything else
//! degrades.

mod normalize;
mod shape;
mod source;

pub use normalize::{
    AMOUNT_FIELDS, Application, ApplicationCategory, CATEGORY_FIELDS, INFERENCE_RULES,
    INFERENCE_RULES_VERSION, InferenceRule, normalize, normalize_all, resolve_amount,
    resolve_category,
};
pub use shape::{DetailShape, PackageDetail};
pub use source::{ApiPortfolioSource, PACKAGE_LIST_PATH};

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::models::portfolio::{PackageSummary, RawApplication};
use crate::view::{PackageView, Portfolio};

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("Failed to load package list: {0}")]
    SummaryList(#[source] ClientError),
}

impl AggregationError {
    pub fn client_error(&self) -> &ClientError {
        match self {
            AggregationError::SummaryList(e) => e,
        }
    }
}

/// Where aggregation reads from.
#[async_trait]
pub trait PortfolioSource: Send + Sync {
    async fn package_summaries(&self) -> ClientResult<Vec<PackageSummary>>;

    /// Raw detail payload; its shape is detected by the engine.
    async fn package_detail(&self, id: &str) -> ClientResult<Value>;

    async fn applications(&self, category: ApplicationCategory) -> ClientResult<Vec<RawApplication>>;
}

/// Builds [`Portfolio`]s from a [`PortfolioSource`]. Holds no state between
/// passes.
pub struct AggregationEngine<S> {
    source: S,
}

impl<S: PortfolioSource> AggregationEngine<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn aggregate(&self) -> Result<Portfolio, AggregationError> {
        let summaries = self
            .source
            .package_summaries()
            .await
            .map_err(AggregationError::SummaryList)?;
        debug!(packages = summaries.len(), "loaded package summaries");

        let (packages, listed) = futures::join!(
            join_all(summaries.iter().map(|s| self.package_view(s))),
            self.listed_applications(),
        );

        let portfolio = Portfolio::assemble(packages, listed);
        info!(
            packages = portfolio.packages.len(),
            standalone = portfolio.standalone_policies.len(),
            degraded = portfolio.has_partial_failures(),
            "portfolio aggregated"
        );
        Ok(portfolio)
    }

    async fn package_view(&self, summary: &PackageSummary) -> PackageView {
        let embedded = summary.embedded_applications();
        if !embedded.is_empty() {
            return PackageView::build(summary, normalize_all(&embedded), None);
        }

        match self.source.package_detail(&summary.id).await {
            Ok(payload) => {
                let detail = PackageDetail::from_value(&payload);
                match detail.shape() {
                    Some(shape) => debug!(package = %summary.id, ?shape, "detail shape matched"),
                    None => warn!(
                        package = %summary.id,
                        "unrecognized package detail shape, treating as empty"
                    ),
                }
                PackageView::build(summary, normalize_all(&detail.into_applications()), None)
            }
            Err(e) => {
                warn!(package = %summary.id, error = %e, "package detail failed");
                PackageView::build(summary, Vec::new(), Some(e.to_string()))
            }
        }
    }

    async fn listed_applications(&self) -> Vec<Application> {
        let listings = join_all(ApplicationCategory::FETCHABLE.iter().map(|category| async move {
            match self.source.applications(*category).await {
                Ok(raws) => raws,
                Err(e) => {
                    warn!(category = category.slug(), error = %e, "category listing failed");
                    Vec::new()
                }
            }
        }))
        .await;

        listings.iter().flat_map(|raws| raws.iter().map(normalize)).collect()
    }
}

#[cfg(test)]
mod tests;
