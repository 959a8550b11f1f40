//! Pushes a reviewed purchase order into the external catalog.
//!
//! One sequential pass over the lines of one PO. Vendor and location lookup
//! and purchase-order creation are hard failures; everything that happens to
//! an individual line is recorded in the [`SyncReport`] and the pass carries
//! on.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogApi, CustomAttributes, ItemPatch, ItemPayload, NewOrderLine, NewPurchaseOrder};
use crate::db::Store;
use crate::error::{BridgeError, Result};
use crate::models::{Enrichment, ImportStatus, ReconciledLineInput, StagedLine};
use crate::reconciler::public_identifier;
use crate::{registry, staging};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub po: String,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub lines: Vec<ReconciledLineInput>,
}

impl SyncRequest {
    pub fn validate(&self) -> Result<()> {
        if self.po.trim().is_empty() || self.vendor_name.trim().is_empty() {
            return Err(BridgeError::InvalidRequest("po and vendorName are required".to_string()));
        }
        if self.lines.is_empty() {
            return Err(BridgeError::InvalidRequest("lines must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Outcome of attaching one line to the created purchase order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineResult {
    pub product_identifier: String,
    /// Heartland item the line was created or updated as.
    pub item_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingStagedLine,
    ItemNotFoundAfterCreate,
    UpsertFailed,
}

/// A line that never reached the purchase order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedLine {
    pub product_identifier: String,
    pub reason: SkipReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// An image that could not be attached. The line itself still syncs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFailure {
    pub product_identifier: String,
    pub item_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub po_id: i64,
    pub results: Vec<LineResult>,
    pub skipped: Vec<SkippedLine>,
    pub image_failures: Vec<ImageFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Updated(i64),
    Created(i64),
    /// Created, but the follow-up lookup by public id found nothing.
    Missing,
}

struct ReadyLine {
    product_identifier: String,
    item_id: i64,
    qty: i64,
    unit_cost: f64,
}

fn join_tags(enrichment_tags: Option<&str>, sub_category: Option<&str>) -> Option<String> {
    let tags: Vec<&str> = [enrichment_tags, sub_category]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    (!tags.is_empty()).then(|| tags.join(", "))
}

pub fn build_item_payload(
    staged: &StagedLine,
    line: &ReconciledLineInput,
    enrichment: &Enrichment,
    vendor_id: i64,
) -> ItemPayload {
    let sub_category = line.sub_category.as_deref();
    ItemPayload {
        public_id: public_identifier(&staged.product_number, sub_category),
        description: staged.description.clone(),
        cost: staged.default_cost,
        price: line.current_price.or(staged.current_price).unwrap_or(0.0),
        primary_vendor_id: vendor_id,
        active: staged.active,
        track_inventory: staged.track_inventory,
        custom: CustomAttributes {
            taxable: staged.taxable,
            department: staged.department.clone(),
            category: enrichment.category.clone(),
            theme: enrichment.theme.clone(),
            tags: join_tags(enrichment.tags.as_deref(), sub_category),
            sub_department: line.sub_department.clone(),
            sub_category: line.sub_category.clone(),
            bricklink_id: staged.product_identifier.clone(),
        },
    }
}

/// Update the item if its public id already exists, otherwise create it and
/// look the new id up.
pub async fn upsert_item(catalog: &dyn CatalogApi, payload: &ItemPayload) -> Result<Upsert> {
    if let Some(item_id) = catalog.find_item_id(&payload.public_id).await? {
        catalog.update_item(item_id, payload).await?;
        return Ok(Upsert::Updated(item_id));
    }
    catalog.create_item(payload).await?;
    Ok(match catalog.find_item_id(&payload.public_id).await? {
        Some(item_id) => Upsert::Created(item_id),
        None => Upsert::Missing,
    })
}

async fn resolve_vendor_and_location(catalog: &dyn CatalogApi, vendor_name: &str) -> Result<(i64, i64)> {
    let vendor_id = catalog
        .find_vendor_id(vendor_name)
        .await?
        .ok_or_else(|| BridgeError::VendorNotFound(vendor_name.to_string()))?;
    let location_id = catalog
        .first_location_id()
        .await?
        .ok_or(BridgeError::NoLocationAvailable)?;
    Ok((vendor_id, location_id))
}

pub async fn sync_purchase_order(store: &Store, catalog: &dyn CatalogApi, request: &SyncRequest) -> Result<SyncReport> {
    request.validate()?;
    let po = request.po.as_str();

    let (vendor_id, location_id) = resolve_vendor_and_location(catalog, &request.vendor_name).await?;
    info!(po, vendor_id, location_id, lines = request.lines.len(), "starting sync");

    let mut ready = Vec::new();
    let mut skipped = Vec::new();
    let mut image_failures = Vec::new();

    for line in &request.lines {
        let pid = line.product_identifier.as_str();
        let (staged, enrichment) = {
            let conn = store.lock()?;
            let staged = staging::find_line(&conn, po, pid)?;
            let enrichment = staging::enrichment(&conn, pid)?;
            (staged, enrichment)
        };
        let Some(staged) = staged else {
            warn!(po, product_identifier = pid, "no staged line, skipping");
            skipped.push(SkippedLine {
                product_identifier: pid.to_string(),
                reason: SkipReason::MissingStagedLine,
                detail: None,
            });
            continue;
        };

        let payload = build_item_payload(&staged, line, &enrichment, vendor_id);
        let item_id = match upsert_item(catalog, &payload).await {
            Ok(Upsert::Updated(id)) => {
                debug!(po, public_id = %payload.public_id, item_id = id, "updated item");
                id
            }
            Ok(Upsert::Created(id)) => {
                debug!(po, public_id = %payload.public_id, item_id = id, "created item");
                id
            }
            Ok(Upsert::Missing) => {
                warn!(po, public_id = %payload.public_id, "created item not found, skipping");
                skipped.push(SkippedLine {
                    product_identifier: pid.to_string(),
                    reason: SkipReason::ItemNotFoundAfterCreate,
                    detail: Some(payload.public_id.clone()),
                });
                continue;
            }
            Err(e) => {
                warn!(po, public_id = %payload.public_id, error = %e, "item upsert failed, skipping");
                skipped.push(SkippedLine {
                    product_identifier: pid.to_string(),
                    reason: SkipReason::UpsertFailed,
                    detail: Some(e.to_string()),
                });
                continue;
            }
        };

        if let Some(url) = line.image_url.as_deref().filter(|u| !u.trim().is_empty()) {
            if let Err(e) = catalog.attach_image(item_id, url).await {
                warn!(po, item_id, error = %e, "image upload failed");
                image_failures.push(ImageFailure {
                    product_identifier: pid.to_string(),
                    item_id,
                    error: e.to_string(),
                });
            }
        }

        ready.push(ReadyLine {
            product_identifier: pid.to_string(),
            item_id,
            qty: line.quantity,
            unit_cost: line.unit_cost,
        });
    }

    let header = {
        let conn = store.lock()?;
        staging::first_line_for_po(&conn, po)?
    };
    let order = NewPurchaseOrder {
        public_id: po.to_string(),
        vendor_id,
        receive_at_location_id: location_id,
        start_shipments_at: header.as_ref().and_then(|h| h.start_ship.clone()),
        end_shipments_at: header.as_ref().and_then(|h| h.end_ship.clone()),
        description: header.as_ref().and_then(|h| h.po_description.clone()),
    };
    let po_id = catalog.create_purchase_order(&order).await?;
    info!(po, po_id, "created purchase order");

    let mut results = Vec::with_capacity(ready.len());
    for line in ready {
        let order_line = NewOrderLine {
            item_id: line.item_id,
            qty: line.qty,
            unit_cost: line.unit_cost,
        };
        let result = match catalog.add_order_line(po_id, &order_line).await {
            Ok(line_id) => LineResult {
                product_identifier: line.product_identifier,
                item_id: line.item_id,
                line_id: Some(line_id),
                error: None,
            },
            Err(e) => {
                warn!(po, po_id, item_id = line.item_id, error = %e, "adding PO line failed");
                LineResult {
                    product_identifier: line.product_identifier,
                    item_id: line.item_id,
                    line_id: None,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(result);
    }

    // TODO: persist the external PO URL on the registry row once the
    // platform's web URL format for orders is confirmed.
    let reasserted = store
        .lock()
        .and_then(|conn| registry::set_status(&conn, po, ImportStatus::Reviewed));
    if let Err(e) = reasserted {
        warn!(po, error = %e, "could not re-assert reviewed status");
    }

    info!(
        po,
        po_id,
        attached = results.iter().filter(|r| r.error.is_none()).count(),
        skipped = skipped.len(),
        "sync finished"
    );
    Ok(SyncReport {
        po_id,
        results,
        skipped,
        image_failures,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub po: String,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub start_shipments_at: Option<String>,
    #[serde(default)]
    pub end_shipments_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Create an empty purchase order outside the full sync.
pub async fn create_order(catalog: &dyn CatalogApi, request: &CreateOrderRequest) -> Result<i64> {
    if request.po.trim().is_empty() || request.vendor_name.trim().is_empty() {
        return Err(BridgeError::InvalidRequest("po and vendorName are required".to_string()));
    }
    let (vendor_id, location_id) = resolve_vendor_and_location(catalog, &request.vendor_name).await?;
    let order = NewPurchaseOrder {
        public_id: request.po.clone(),
        vendor_id,
        receive_at_location_id: location_id,
        start_shipments_at: request.start_shipments_at.clone(),
        end_shipments_at: request.end_shipments_at.clone(),
        description: request.description.clone(),
    };
    let po_id = catalog.create_purchase_order(&order).await?;
    info!(po = %request.po, po_id, "created standalone purchase order");
    Ok(po_id)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub purchase_order_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub unit_cost: f64,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Update one existing item and attach it to an existing purchase order.
pub async fn add_item_to_order(catalog: &dyn CatalogApi, request: &AddItemRequest) -> Result<i64> {
    let patch = ItemPatch {
        description: request.description.clone(),
        cost: Some(request.unit_cost),
        price: request.current_price,
    };
    catalog.patch_item(request.item_id, &patch).await?;
    let line = NewOrderLine {
        item_id: request.item_id,
        qty: request.quantity,
        unit_cost: request.unit_cost,
    };
    catalog.add_order_line(request.purchase_order_id, &line).await
}
