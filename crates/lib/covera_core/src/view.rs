//! View models and the pure projections behind them.
//!
//! Everything here is a total function: unknown statuses are echoed back as
//! their own label, and amounts are clamped instead of rejected.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::warn;

use crate::aggregation::{Application, ApplicationCategory};
use crate::models::portfolio::PackageSummary;

/// Package status of a package that is still being put together.
pub const PACKAGE_STATUS_FORMING: &str = "forming";

/// Package statuses that allow payment.
pub const PAYABLE_PACKAGE_STATUSES: &[&str] = &["pending_payment", "awaiting_payment", "approved"];

/// Application statuses that make an application payable outside a package.
pub const INDEPENDENTLY_PAYABLE_STATUSES: &[&str] = &["approved", "pending_payment"];

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub label: String,
    pub severity: Severity,
}

impl StatusDisplay {
    fn new(label: impl Into<String>, severity: Severity) -> Self {
        Self {
            label: label.into(),
            severity,
        }
    }
}

/// `Pending-Payment`, `pending payment` and `PENDING_PAYMENT` are the same
/// status.
pub fn normalize_status(status: &str) -> String {
    status
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

fn fallback_display(status: &str) -> StatusDisplay {
    let raw = status.trim();
    if raw.is_empty() {
        StatusDisplay::new("Unknown", Severity::Neutral)
    } else {
        StatusDisplay::new(raw, Severity::Neutral)
    }
}

pub fn package_status_display(status: &str) -> StatusDisplay {
    match normalize_status(status).as_str() {
        "forming" => StatusDisplay::new("Forming", Severity::Info),
        "pending_payment" | "awaiting_payment" => {
            StatusDisplay::new("Awaiting payment", Severity::Warning)
        }
        "approved" => StatusDisplay::new("Approved", Severity::Success),
        "paid" | "active" => StatusDisplay::new("Active", Severity::Success),
        "under_review" | "submitted" => StatusDisplay::new("Under review", Severity::Info),
        "rejected" => StatusDisplay::new("Rejected", Severity::Danger),
        "cancelled" | "canceled" => StatusDisplay::new("Cancelled", Severity::Neutral),
        "expired" => StatusDisplay::new("Expired", Severity::Neutral),
        _ => fallback_display(status),
    }
}

pub fn application_status_display(status: &str) -> StatusDisplay {
    match normalize_status(status).as_str() {
        "draft" => StatusDisplay::new("Draft", Severity::Neutral),
        "submitted" | "pending" => StatusDisplay::new("Submitted", Severity::Info),
        "under_review" | "in_review" => StatusDisplay::new("Under review", Severity::Info),
        "approved" => StatusDisplay::new("Approved", Severity::Success),
        "pending_payment" | "awaiting_payment" => {
            StatusDisplay::new("Awaiting payment", Severity::Warning)
        }
        "paid" | "active" => StatusDisplay::new("Active", Severity::Success),
        "rejected" | "declined" => StatusDisplay::new("Rejected", Severity::Danger),
        "cancelled" | "canceled" => StatusDisplay::new("Cancelled", Severity::Neutral),
        "expired" => StatusDisplay::new("Expired", Severity::Neutral),
        _ => fallback_display(status),
    }
}

pub fn category_label(category: ApplicationCategory) -> &'static str {
    category.label()
}

/// `total * (1 - discount / 100)` rounded half away from zero to cents, then
/// kept within `[0, total]`. The discount is read as a percentage clamped to
/// `[0, 100]`. The result may differ from the exact product by up to half a
/// cent.
pub fn calculate_discounted_amount(total: Decimal, discount: Decimal) -> Decimal {
    let total = total.max(Decimal::ZERO);
    let discount = discount.clamp(Decimal::ZERO, HUNDRED);
    let discounted = (total * (HUNDRED - discount) / HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    discounted.clamp(Decimal::ZERO, total)
}

fn is_payable_package_status(status: &str) -> bool {
    PAYABLE_PACKAGE_STATUSES.contains(&normalize_status(status).as_str())
}

fn is_independently_payable(status: &str) -> bool {
    INDEPENDENTLY_PAYABLE_STATUSES.contains(&normalize_status(status).as_str())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub category_label: &'static str,
    pub title: String,
    pub display_status: StatusDisplay,
}

impl From<Application> for ApplicationView {
    fn from(application: Application) -> Self {
        Self {
            category_label: category_label(application.category),
            title: application.title().to_string(),
            display_status: application_status_display(&application.status),
            application,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub applications: Vec<ApplicationView>,
    pub total_amount: Decimal,
    pub discount: Decimal,
    pub discounted_amount: Decimal,
    pub display_status: StatusDisplay,
    pub can_pay: bool,
    pub can_continue_setup: bool,
    pub can_cancel: bool,
    /// Set when the detail fetch failed; the view then carries no
    /// applications.
    pub detail_error: Option<String>,
}

impl PackageView {
    pub fn build(
        summary: &PackageSummary,
        applications: Vec<Application>,
        detail_error: Option<String>,
    ) -> Self {
        let total_amount: Decimal = applications.iter().map(|a| a.amount).sum();
        let discount = summary.discount.clamp(Decimal::ZERO, HUNDRED);
        let can_pay = is_payable_package_status(&summary.status) && !applications.is_empty();

        Self {
            id: summary.id.clone(),
            name: summary.name.clone(),
            description: summary.description.clone(),
            status: summary.status.clone(),
            created_at: summary.created_at,
            total_amount,
            discount,
            discounted_amount: calculate_discounted_amount(total_amount, discount),
            display_status: package_status_display(&summary.status),
            can_pay,
            can_continue_setup: normalize_status(&summary.status) == PACKAGE_STATUS_FORMING,
            can_cancel: true,
            applications: applications.into_iter().map(ApplicationView::from).collect(),
            detail_error,
        }
    }

    pub fn holds(&self, application_id: &str) -> bool {
        self.applications
            .iter()
            .any(|a| a.application.id == application_id)
    }
}

/// An application payable on its own, outside any package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandalonePolicyView {
    #[serde(flatten)]
    pub application: ApplicationView,
    pub can_pay: bool,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub packages: Vec<PackageView>,
    pub standalone_policies: Vec<StandalonePolicyView>,
}

impl Portfolio {
    /// Combine package views with the per-category listings.
    ///
    /// A listed application becomes standalone when no package in
    /// `packages` holds its id and its status is independently payable.
    /// Repeated ids across listings collapse to the first occurrence.
    pub fn assemble(packages: Vec<PackageView>, listed: Vec<Application>) -> Self {
        let held: HashSet<&str> = packages
            .iter()
            .flat_map(|p| p.applications.iter())
            .map(|a| a.application.id.as_str())
            .filter(|id| !id.is_empty())
            .collect();

        let (listed, anonymous): (Vec<_>, Vec<_>) =
            listed.into_iter().partition(|a| !a.id.is_empty());
        let skipped = anonymous
            .iter()
            .filter(|a| is_independently_payable(&a.status))
            .count();
        if skipped > 0 {
            warn!(skipped, "payable listed applications without an id were left out");
        }

        let mut seen = HashSet::new();
        let standalone_policies = listed
            .into_iter()
            .filter(|a| !held.contains(a.id.as_str()))
            .filter(|a| is_independently_payable(&a.status))
            .filter(|a| seen.insert(a.id.clone()))
            .map(|a| StandalonePolicyView {
                application: a.into(),
                can_pay: true,
            })
            .collect();

        Self {
            packages,
            standalone_policies,
        }
    }

    pub fn package(&self, id: &str) -> Option<&PackageView> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// First package holding an application of `category`.
    pub fn package_for_category(&self, category: ApplicationCategory) -> Option<&PackageView> {
        self.packages.iter().find(|p| {
            p.applications
                .iter()
                .any(|a| a.application.category == category)
        })
    }

    /// Sum of what can be paid right now.
    pub fn total_due(&self) -> Decimal {
        let packages: Decimal = self
            .packages
            .iter()
            .filter(|p| p.can_pay)
            .map(|p| p.discounted_amount)
            .sum();
        let standalone: Decimal = self
            .standalone_policies
            .iter()
            .map(|s| s.application.application.amount)
            .sum();
        packages + standalone
    }

    pub fn has_partial_failures(&self) -> bool {
        self.packages.iter().any(|p| p.detail_error.is_some())
    }
}
