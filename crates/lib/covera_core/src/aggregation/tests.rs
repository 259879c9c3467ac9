use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use super::*;

/// In-memory source. Missing detail ids fail with a 500.
#[derive(Default)]
struct FakeSource {
    summaries: Option<Value>,
    details: HashMap<String, Value>,
    listings: HashMap<&'static str, Value>,
    failing_categories: Vec<ApplicationCategory>,
    detail_calls: AtomicUsize,
    seen_details: Mutex<Vec<String>>,
}

impl FakeSource {
    fn with_summaries(summaries: Value) -> Self {
        Self {
            summaries: Some(summaries),
            ..Default::default()
        }
    }

    fn detail(mut self, id: &str, payload: Value) -> Self {
        self.details.insert(id.to_string(), payload);
        self
    }

    fn listing(mut self, category: ApplicationCategory, payload: Value) -> Self {
        self.listings.insert(category.slug(), payload);
        self
    }

    fn failing(mut self, category: ApplicationCategory) -> Self {
        self.failing_categories.push(category);
        self
    }
}

fn server_error() -> ClientError {
    ClientError::Http {
        status: 500,
        body: "boom".into(),
    }
}

#[async_trait]
impl PortfolioSource for FakeSource {
    async fn package_summaries(&self) -> ClientResult<Vec<PackageSummary>> {
        let value = self.summaries.clone().ok_or_else(server_error)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn package_detail(&self, id: &str) -> ClientResult<Value> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_details.lock().unwrap().push(id.to_string());
        self.details.get(id).cloned().ok_or_else(server_error)
    }

    async fn applications(&self, category: ApplicationCategory) -> ClientResult<Vec<RawApplication>> {
        if self.failing_categories.contains(&category) {
            return Err(ClientError::Transport("connection refused".into()));
        }
        Ok(self
            .listings
            .get(category.slug())
            .and_then(|v| v.as_array())
            .map(|items| RawApplication::collect(items))
            .unwrap_or_default())
    }
}

fn sample_source() -> FakeSource {
    FakeSource::with_summaries(json!([
        {
            "id": "embedded",
            "name": "Family",
            "status": "approved",
            "discount": 10,
            "applications": [
                { "id": "a1", "type": "travel", "calculatedAmount": "100.00", "status": "approved" },
                { "id": "a2", "vin": "WVW1", "amount": 200, "status": "approved" }
            ]
        },
        { "id": "detailed", "name": "Home", "status": "pending_payment", "discount": 0, "applications": [] },
        { "id": "broken", "name": "Broken", "status": "forming" },
        { "id": "odd", "name": "Odd", "status": "forming" }
    ]))
    .detail(
        "detailed",
        json!({ "policies": [
            { "id": "a3", "propertyAddress": "Main st 1", "price": "350.5", "status": "approved" }
        ] }),
    )
    .detail("odd", json!({ "id": "odd", "name": "Odd" }))
    .listing(
        ApplicationCategory::Travel,
        json!([
            { "id": "a1", "type": "travel", "amount": 100, "status": "approved" },
            { "id": "s1", "type": "travel", "amount": 80, "status": "approved" }
        ]),
    )
    .listing(
        ApplicationCategory::Property,
        json!([
            { "id": "a3", "propertyAddress": "Main st 1", "price": 350.5, "status": "approved" },
            { "id": "s2", "type": "property", "amount": 40, "status": "pending_payment" },
            { "id": "s3", "type": "property", "amount": 15, "status": "draft" }
        ]),
    )
    .listing(
        ApplicationCategory::Health,
        json!([{ "id": "s1", "type": "travel", "amount": 80, "status": "approved" }]),
    )
}

#[tokio::test]
async fn embedded_applications_skip_detail_fetch() {
    let engine = AggregationEngine::new(sample_source());
    let portfolio = engine.aggregate().await.unwrap();

    let embedded = portfolio.package("embedded").unwrap();
    assert_eq!(embedded.applications.len(), 2);
    assert_eq!(embedded.total_amount, dec!(300));
    assert_eq!(embedded.discounted_amount, dec!(270));
    assert!(embedded.can_pay);

    let seen = engine.source().seen_details.lock().unwrap().clone();
    assert!(!seen.contains(&"embedded".to_string()));
    // An empty embedded array falls back to the detail endpoint.
    assert!(seen.contains(&"detailed".to_string()));
}

#[tokio::test]
async fn detail_shapes_are_recognized() {
    let portfolio = AggregationEngine::new(sample_source()).aggregate().await.unwrap();

    let detailed = portfolio.package("detailed").unwrap();
    assert_eq!(detailed.applications.len(), 1);
    assert_eq!(
        detailed.applications[0].application.category,
        ApplicationCategory::Property
    );
    assert_eq!(detailed.total_amount, dec!(350.5));
    assert!(detailed.can_pay);

    let odd = portfolio.package("odd").unwrap();
    assert!(odd.applications.is_empty());
    assert!(odd.detail_error.is_none());
    assert!(odd.can_continue_setup);
}

#[tokio::test]
async fn failed_detail_degrades_only_that_package() {
    let portfolio = AggregationEngine::new(sample_source()).aggregate().await.unwrap();

    let broken = portfolio.package("broken").unwrap();
    assert!(broken.detail_error.is_some());
    assert!(broken.applications.is_empty());
    assert!(broken.can_cancel);
    assert!(portfolio.has_partial_failures());

    assert!(portfolio.package("embedded").unwrap().detail_error.is_none());
    assert!(portfolio.package("detailed").unwrap().detail_error.is_none());
}

#[tokio::test]
async fn applications_are_counted_exactly_once() {
    let portfolio = AggregationEngine::new(sample_source()).aggregate().await.unwrap();

    let mut in_packages: Vec<&str> = portfolio
        .packages
        .iter()
        .flat_map(|p| p.applications.iter().map(|a| a.application.id.as_str()))
        .collect();
    let standalone: Vec<&str> = portfolio
        .standalone_policies
        .iter()
        .map(|s| s.application.application.id.as_str())
        .collect();

    assert_eq!(standalone.len(), 2);
    assert!(standalone.contains(&"s1"));
    assert!(standalone.contains(&"s2"));
    for id in &standalone {
        assert!(!in_packages.contains(id));
    }

    in_packages.sort_unstable();
    let before = in_packages.len();
    in_packages.dedup();
    assert_eq!(before, in_packages.len());
}

#[tokio::test]
async fn aggregation_is_idempotent() {
    let engine = AggregationEngine::new(sample_source());
    let first = serde_json::to_value(engine.aggregate().await.unwrap()).unwrap();
    let second = serde_json::to_value(engine.aggregate().await.unwrap()).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn failing_category_contributes_nothing() {
    let engine = AggregationEngine::new(sample_source().failing(ApplicationCategory::Property));
    let portfolio = engine.aggregate().await.unwrap();

    let standalone: Vec<&str> = portfolio
        .standalone_policies
        .iter()
        .map(|s| s.application.application.id.as_str())
        .collect();
    assert_eq!(standalone, ["s1"]);
}

#[tokio::test]
async fn summary_failure_fails_the_pass() {
    let engine = AggregationEngine::new(FakeSource::default());
    let err = engine.aggregate().await.unwrap_err();
    assert!(matches!(
        err.client_error(),
        ClientError::Http { status: 500, .. }
    ));
}

#[tokio::test]
async fn discount_stays_within_bounds() {
    let source = FakeSource::with_summaries(json!([
        { "id": "over", "status": "approved", "discount": 250,
          "applications": [{ "id": "x1", "amount": 100 }] },
        { "id": "under", "status": "approved", "discount": -30,
          "applications": [{ "id": "x2", "amount": 100 }] },
        { "id": "garbage", "status": "approved", "discount": "n/a",
          "applications": [{ "id": "x3", "amount": "abc" }] }
    ]));
    let portfolio = AggregationEngine::new(source).aggregate().await.unwrap();

    for package in &portfolio.packages {
        assert!(package.discounted_amount >= Decimal::ZERO);
        assert!(package.discounted_amount <= package.total_amount);
    }
    assert_eq!(portfolio.package("over").unwrap().discounted_amount, Decimal::ZERO);
    assert_eq!(portfolio.package("under").unwrap().discounted_amount, dec!(100));
    assert_eq!(portfolio.package("garbage").unwrap().total_amount, Decimal::ZERO);
}

#[tokio::test]
async fn duplicate_ids_inside_a_package_collapse() {
    let source = FakeSource::with_summaries(json!([
        { "id": "p", "status": "approved", "applications": [
            { "id": "d1", "amount": 10 },
            { "id": "d1", "amount": 10 }
        ] }
    ]));
    let portfolio = AggregationEngine::new(source).aggregate().await.unwrap();
    assert_eq!(portfolio.package("p").unwrap().total_amount, dec!(10));
}

#[tokio::test]
async fn malformed_embedded_applications_degrade_only_that_package() {
    let source = FakeSource::with_summaries(json!([
        { "id": "good", "status": "approved", "applications": [{ "id": "g1", "amount": 25 }] },
        { "id": "bad", "status": "approved", "applications": { "unexpected": true } }
    ]))
    .detail("bad", json!({ "items": [{ "id": "b1", "amount": 5 }] }));
    let portfolio = AggregationEngine::new(source).aggregate().await.unwrap();

    assert_eq!(portfolio.package("good").unwrap().total_amount, dec!(25));
    let bad = portfolio.package("bad").unwrap();
    assert_eq!(bad.applications.len(), 1);
    assert_eq!(bad.total_amount, dec!(5));
}
