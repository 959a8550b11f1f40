use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Lifecycle of one purchase order in the import master registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Loaded,
    Reviewing,
    Reviewed,
}

impl ImportStatus {
    pub const ALL: [ImportStatus; 3] = [Self::Loaded, Self::Reviewing, Self::Reviewed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Reviewing => "reviewing",
            Self::Reviewed => "reviewed",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BridgeError::UnknownStatus(s.to_string()))
    }
}

/// The reviewer-supplied field a line failed validation on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineField {
    #[serde(rename = "price")]
    Price,
    #[serde(rename = "subDepartment")]
    SubDepartment,
}

impl LineField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::SubDepartment => "subDepartment",
        }
    }
}

/// One purchase-order line as imported from a spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedLine {
    pub id: Option<i64>,
    pub po_number: String,
    pub po_description: Option<String>,
    pub start_ship: Option<String>,
    pub end_ship: Option<String>,
    pub vendor: Option<String>,
    pub receive_location: Option<String>,
    pub description: Option<String>,
    pub default_cost: f64,
    pub current_price: Option<f64>,
    pub active: bool,
    pub track_inventory: bool,
    pub primary_vendor: Option<String>,
    pub taxable: bool,
    pub department: Option<String>,
    pub category: Option<String>,
    pub series: Option<String>,
    pub product_number: String,
    pub unit_cost: f64,
    pub quantity: i64,
    pub product_identifier: String,
}

/// Master product data row from the catalog reference spreadsheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogRecord {
    pub brand: Option<String>,
    pub item_number: Option<String>,
    pub description: Option<String>,
    pub product_identifier: String,
    pub department: Option<String>,
    pub sub_department: Option<String>,
    pub category: Option<String>,
    pub theme: Option<String>,
    pub long_description: Option<String>,
    pub primary_vendor: Option<String>,
    pub sell_online: bool,
    pub tags: Option<String>,
    pub active: bool,
    pub msrp: f64,
    pub default_cost: f64,
    pub current_price: f64,
    pub taxable: bool,
    pub upc: Option<String>,
    pub height: f64,
    pub width: f64,
    pub depth: f64,
    pub weight: f64,
    pub weight_in_oz: f64,
    pub image_1: Option<String>,
    pub image_2: Option<String>,
    pub image_3: Option<String>,
}

/// Preferred image for a product, overriding the catalog's own image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub product_identifier: String,
    pub image_url: String,
}

/// Catalog fields merged into an item's custom attributes during sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub tags: Option<String>,
    pub category: Option<String>,
    pub theme: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportMaster {
    pub po_number: String,
    pub po_url: Option<String>,
    #[serde(rename = "po_import_status")]
    pub status: ImportStatus,
}

/// A staged line as shown to a reviewer, with its resolved image.
#[derive(Debug, Clone, Serialize)]
pub struct ImportItem {
    #[serde(flatten)]
    pub line: StagedLine,
    pub image_url: Option<String>,
}

/// Reviewer classification and price correction for one staged line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSelection {
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub sub_department: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
}

/// A reconciled line submitted for sync. The Heartland item id it ends up
/// with is reported back in the sync result, not sent in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledLineInput {
    pub product_identifier: String,
    #[serde(default)]
    pub sub_department: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    pub quantity: i64,
    pub unit_cost: f64,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    PurchaseOrder,
    Catalog,
    Images,
}

impl UploadKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::PurchaseOrder => "po",
            Self::Catalog => "catalog",
            Self::Images => "images",
        }
    }
}
