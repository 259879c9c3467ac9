//! Known shapes of the package detail payload.
//!
//! The detail endpoint has shipped its applications under several field
//! names over time. Each known layout is a [`DetailShape`]; they are
//! probed in [`DetailShape::PROBE_ORDER`] and the first one holding a
//! non-empty array of objects wins.

use serde_json::Value;

use crate::models::portfolio::RawApplication;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailShape {
    /// `{ "applications": [...] }`
    Applications,
    /// `{ "policyApplications": [...] }`
    PolicyApplications,
    /// `{ "policies": [...] }`
    Policies,
    /// `{ "items": [...] }`
    Items,
    /// `{ "data": { "applications": [...] } }`
    NestedData,
    /// The payload itself is the array.
    BareArray,
}

impl DetailShape {
    pub const PROBE_ORDER: [DetailShape; 6] = [
        DetailShape::Applications,
        DetailShape::PolicyApplications,
        DetailShape::Policies,
        DetailShape::Items,
        DetailShape::NestedData,
        DetailShape::BareArray,
    ];

    /// JSON path from the payload root to the array.
    pub fn path(self) -> &'static [&'static str] {
        match self {
            DetailShape::Applications => &["applications"],
            DetailShape::PolicyApplications => &["policyApplications"],
            DetailShape::Policies => &["policies"],
            DetailShape::Items => &["items"],
            DetailShape::NestedData => &["data", "applications"],
            DetailShape::BareArray => &[],
        }
    }

    fn probe(self, payload: &Value) -> Option<Vec<RawApplication>> {
        let node = self
            .path()
            .iter()
            .try_fold(payload, |node, key| node.get(key))?;
        let applications = RawApplication::collect(node.as_array()?);
        (!applications.is_empty()).then_some(applications)
    }
}

/// A package detail payload, classified by where its applications live.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageDetail {
    Found {
        shape: DetailShape,
        applications: Vec<RawApplication>,
    },
    /// No candidate held a non-empty array. The package has no applications.
    Unrecognized,
}

impl PackageDetail {
    pub fn from_value(payload: &Value) -> Self {
        DetailShape::PROBE_ORDER
            .iter()
            .find_map(|shape| {
                shape.probe(payload).map(|applications| PackageDetail::Found {
                    shape: *shape,
                    applications,
                })
            })
            .unwrap_or(PackageDetail::Unrecognized)
    }

    pub fn shape(&self) -> Option<DetailShape> {
        match self {
            PackageDetail::Found { shape, .. } => Some(*shape),
            PackageDetail::Unrecognized => None,
        }
    }

    pub fn into_applications(self) -> Vec<RawApplication> {
        match self {
            PackageDetail::Found { applications, .. } => applications,
            PackageDetail::Unrecognized => Vec::new(),
        }
    }
}
