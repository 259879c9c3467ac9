//! Application normalization: one canonical category and amount per
//! application, whatever field names the backend used.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::portfolio::{RawApplication, parse_decimal};

/// Insurance category of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationCategory {
    AutoLiability,
    AutoComprehensive,
    Travel,
    Property,
    Health,
    /// No rule matched. Rendered as "Unknown type", never hidden.
    Unknown,
}

impl ApplicationCategory {
    /// Categories with their own `/applications/{category}` listing.
    pub const FETCHABLE: &'static [ApplicationCategory] = &[
        ApplicationCategory::AutoLiability,
        ApplicationCategory::AutoComprehensive,
        ApplicationCategory::Travel,
        ApplicationCategory::Property,
        ApplicationCategory::Health,
    ];

    /// Path segment / wire name.
    pub fn slug(self) -> &'static str {
        match self {
            ApplicationCategory::AutoLiability => "auto-liability",
            ApplicationCategory::AutoComprehensive => "auto-comprehensive",
            ApplicationCategory::Travel => "travel",
            ApplicationCategory::Property => "property",
            ApplicationCategory::Health => "health",
            ApplicationCategory::Unknown => "unknown",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            ApplicationCategory::AutoLiability => "Auto liability",
            ApplicationCategory::AutoComprehensive => "Auto comprehensive",
            ApplicationCategory::Travel => "Travel",
            ApplicationCategory::Property => "Property",
            ApplicationCategory::Health => "Health",
            ApplicationCategory::Unknown => "Unknown type",
        }
    }

    /// Resolve a backend spelling (`auto_liability`, `Auto liability`,
    /// `TRAVEL`, ...). Unrecognized names yield `None`.
    pub fn from_alias(name: &str) -> Option<Self> {
        let key: String = name
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        let category = match key.as_str() {
            "auto-liability" | "autoliability" | "liability" | "auto" | "car" => {
                ApplicationCategory::AutoLiability
            }
            "auto-comprehensive" | "autocomprehensive" | "comprehensive" | "casco" => {
                ApplicationCategory::AutoComprehensive
            }
            "travel" | "trip" => ApplicationCategory::Travel,
            "property" | "home" | "real-estate" | "realty" => ApplicationCategory::Property,
            "health" | "medical" => ApplicationCategory::Health,
            _ => return None,
        };
        Some(category)
    }
}

/// Explicit category fields, in priority order.
pub const CATEGORY_FIELDS: &[&str] = &["type", "category", "insuranceType"];

/// Amount aliases, in priority order.
pub const AMOUNT_FIELDS: &[&str] = &["calculatedAmount", "amount", "price", "totalAmount"];

const VEHICLE_FIELDS: &[&str] = &[
    "vehicleVin",
    "vin",
    "vehicleMake",
    "vehicleModel",
    "licensePlate",
    "vehicle",
];
const COMPREHENSIVE_FIELDS: &[&str] = &["deductible", "coverageOptions", "theftCoverage"];
const TRAVEL_FIELDS: &[&str] = &[
    "destination",
    "destinationCountry",
    "travelStartDate",
    "travelEndDate",
    "departureDate",
    "returnDate",
];
const PROPERTY_FIELDS: &[&str] = &[
    "propertyAddress",
    "propertyType",
    "propertyValue",
    "constructionYear",
];
const HEALTH_FIELDS: &[&str] = &[
    "healthConditions",
    "medicalConditions",
    "preExistingConditions",
    "medicalHistory",
];

/// One row of the inference table.
pub struct InferenceRule {
    pub category: ApplicationCategory,
    pub matches: fn(&RawApplication) -> bool,
}

/// Bump when [`INFERENCE_RULES`] changes meaning.
pub const INFERENCE_RULES_VERSION: u32 = 1;

/// Field-presence rules, evaluated top to bottom; first match wins.
/// New categories are appended here.
pub const INFERENCE_RULES: &[InferenceRule] = &[
    InferenceRule {
        category: ApplicationCategory::AutoComprehensive,
        matches: |a| a.has_any(VEHICLE_FIELDS) && a.has_any(COMPREHENSIVE_FIELDS),
    },
    InferenceRule {
        category: ApplicationCategory::AutoLiability,
        matches: |a| a.has_any(VEHICLE_FIELDS),
    },
    InferenceRule {
        category: ApplicationCategory::Travel,
        matches: |a| a.has_any(TRAVEL_FIELDS),
    },
    InferenceRule {
        category: ApplicationCategory::Property,
        matches: |a| a.has_any(PROPERTY_FIELDS),
    },
    InferenceRule {
        category: ApplicationCategory::Health,
        matches: |a| a.has_any(HEALTH_FIELDS),
    },
];

/// A normalized application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub category: ApplicationCategory,
    pub amount: Decimal,
    pub status: String,
    pub display_name: Option<String>,
}

impl Application {
    /// Display name, or the category label when the backend sent none.
    pub fn title(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.category.label())
    }
}

/// Canonical category: explicit field, then `displayName` prefix, then the
/// inference table, then [`ApplicationCategory::Unknown`].
pub fn resolve_category(raw: &RawApplication) -> ApplicationCategory {
    let explicit = CATEGORY_FIELDS
        .iter()
        .filter_map(|k| raw.first_string(&[*k]))
        .find_map(|v| ApplicationCategory::from_alias(&v));
    if let Some(category) = explicit {
        return category;
    }

    let prefixed = raw
        .first_string(&["displayName"])
        .and_then(|name| {
            name.split_once(':')
                .and_then(|(prefix, _)| ApplicationCategory::from_alias(prefix))
        });
    if let Some(category) = prefixed {
        return category;
    }

    INFERENCE_RULES
        .iter()
        .find(|rule| (rule.matches)(raw))
        .map(|rule| rule.category)
        .unwrap_or(ApplicationCategory::Unknown)
}

/// Canonical amount: first parseable alias, zero when none. Negative values
/// are clamped to zero.
pub fn resolve_amount(raw: &RawApplication) -> Decimal {
    AMOUNT_FIELDS
        .iter()
        .find_map(|k| raw.get(k).and_then(parse_decimal))
        .unwrap_or_default()
        .max(Decimal::ZERO)
}

pub fn normalize(raw: &RawApplication) -> Application {
    Application {
        id: raw
            .first_string(&["id", "applicationId"])
            .unwrap_or_default(),
        category: resolve_category(raw),
        amount: resolve_amount(raw),
        status: raw
            .first_string(&["status", "applicationStatus"])
            .unwrap_or_default(),
        display_name: raw.first_string(&["displayName"]),
    }
}

/// Normalize a batch, dropping repeated ids (first occurrence wins).
/// Applications without an id are always kept.
pub fn normalize_all(raws: &[RawApplication]) -> Vec<Application> {
    let mut seen = std::collections::HashSet::new();
    raws.iter()
        .map(normalize)
        .filter(|a| a.id.is_empty() || seen.insert(a.id.clone()))
        .collect()
}
