//! Logical operations against the external point-of-sale catalog.
//!
//! [`CatalogApi`] is implemented by [`crate::heartland::HeartlandClient`] in
//! production and by an in-memory fake in tests.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Custom attributes attached to every synced item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomAttributes {
    pub taxable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub bricklink_id: String,
}

/// Full item body, used for both create and full-replace update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemPayload {
    pub public_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub cost: f64,
    pub price: f64,
    pub primary_vendor_id: i64,
    pub active: bool,
    pub track_inventory: bool,
    pub custom: CustomAttributes,
}

/// Partial item update; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPurchaseOrder {
    pub public_id: String,
    pub vendor_id: i64,
    pub receive_at_location_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_shipments_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_shipments_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrderLine {
    pub item_id: i64,
    pub qty: i64,
    pub unit_cost: f64,
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// First vendor whose name matches, if any.
    async fn find_vendor_id(&self, name: &str) -> Result<Option<i64>>;

    /// First receiving location the platform lists, if any.
    async fn first_location_id(&self) -> Result<Option<i64>>;

    async fn find_item_id(&self, public_id: &str) -> Result<Option<i64>>;

    /// Create an item. The new id is not returned; look it up by public id.
    async fn create_item(&self, item: &ItemPayload) -> Result<()>;

    async fn update_item(&self, item_id: i64, item: &ItemPayload) -> Result<()>;

    async fn patch_item(&self, item_id: i64, patch: &ItemPatch) -> Result<()>;

    async fn attach_image(&self, item_id: i64, url: &str) -> Result<()>;

    async fn create_purchase_order(&self, order: &NewPurchaseOrder) -> Result<i64>;

    async fn add_order_line(&self, order_id: i64, line: &NewOrderLine) -> Result<i64>;
}
