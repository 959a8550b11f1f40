use axum::extract::{Path, Query, State};
use axum::Json;
use axum_extra::extract::Multipart;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::UploadError;
use super::AppState;
use crate::error::{BridgeError, Result};
use crate::models::{ImportItem, ImportMaster, ReviewSelection};
use crate::sync::{self, AddItemRequest, CreateOrderRequest, SyncReport, SyncRequest};
use crate::{importer, reconciler, registry, staging};

/// Pull the `file` field out of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BridgeError::InvalidRequest(format!("multipart read error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.csv").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| BridgeError::InvalidRequest(format!("failed to read file: {e}")))?;
        return Ok((filename, data.to_vec()));
    }
    Err(BridgeError::InvalidRequest("no 'file' field in upload".to_string()))
}

pub async fn upload_po_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<String, UploadError> {
    let (filename, data) = read_upload(multipart).await?;
    let conn = state.store.lock()?;
    Ok(importer::import_po_csv(&conn, &filename, &data)?.message())
}

pub async fn upload_catalog_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<String, UploadError> {
    let (filename, data) = read_upload(multipart).await?;
    let conn = state.store.lock()?;
    Ok(importer::import_catalog_csv(&conn, &filename, &data)?.message())
}

pub async fn upload_images_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<String, UploadError> {
    let (filename, data) = read_upload(multipart).await?;
    let conn = state.store.lock()?;
    Ok(importer::import_images_csv(&conn, &filename, &data)?.message())
}

pub async fn po_numbers(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let conn = state.store.lock()?;
    Ok(Json(staging::po_numbers(&conn)?))
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    pub po: Option<String>,
}

pub async fn import_items(
    State(state): State<AppState>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<Vec<ImportItem>>> {
    let po = query.po.as_deref().filter(|p| !p.is_empty());
    let conn = state.store.lock()?;
    Ok(Json(staging::import_items(&conn, po)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub current_price: Option<f64>,
}

pub async fn update_item_price(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
    Json(body): Json<PriceUpdate>,
) -> Result<Json<Value>> {
    let price = body
        .current_price
        .filter(|p| p.is_finite())
        .ok_or_else(|| BridgeError::InvalidRequest("currentPrice must be a number".to_string()))?;
    let conn = state.store.lock()?;
    staging::update_price(&conn, line_id, price)?;
    Ok(Json(json!({ "id": line_id, "currentPrice": price })))
}

pub async fn list_import_master(State(state): State<AppState>) -> Result<Json<Vec<ImportMaster>>> {
    let conn = state.store.lock()?;
    Ok(Json(registry::list(&conn)?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: String,
}

pub async fn set_import_status(
    State(state): State<AppState>,
    Path(po): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Value>> {
    let conn = state.store.lock()?;
    let status = registry::set_status_named(&conn, &po, &body.status)?;
    Ok(Json(json!({ "po": po, "status": status })))
}

#[derive(Debug, Deserialize)]
pub struct CompleteReview {
    #[serde(default)]
    pub lines: Vec<ReviewSelection>,
}

pub async fn complete_review(
    State(state): State<AppState>,
    Path(po): Path<String>,
    Json(body): Json<CompleteReview>,
) -> Result<Json<Value>> {
    let conn = state.store.lock()?;
    let outcome = reconciler::complete_review(&conn, &po, &body.lines)?;
    Ok(Json(json!({
        "po": po,
        "status": "reviewed",
        "lines": outcome.lines,
        "unmappedSubCategories": outcome.unmapped,
    })))
}

pub async fn import_heartland(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncReport>> {
    let report = sync::sync_purchase_order(&state.store, state.catalog.as_ref(), &request).await?;
    Ok(Json(report))
}

pub async fn create_po(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>> {
    let purchase_order_id = sync::create_order(state.catalog.as_ref(), &request).await?;
    Ok(Json(json!({ "purchaseOrderId": purchase_order_id })))
}

pub async fn add_item_to_po(
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<Value>> {
    let line_id = sync::add_item_to_order(state.catalog.as_ref(), &request).await?;
    Ok(Json(json!({ "lineId": line_id })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::catalog::fake::FakeCatalog;
    use crate::db::{test_db, Store};
    use crate::models::ImportStatus;
    use crate::server::router;
    use crate::staging::sample_line;

    const BOUNDARY: &str = "po-bridge-test-boundary";

    const PO_CSV: &str = "PO Number,PO Description,PO Start Ship,PO End Ship,PO Vendor,PO Received At Location,\
Item Description,Item Default Cost,Item Current Price,Item Active,Item Track Inventory,Item Primary Vendor,\
Item Taxable,Item Department,Item Category,Item Series,Item #,PO Line Unit Cost,PO Line Qty,Item Bricklink ID
PO-7,Trade,2025-03-01,2025-03-15,Patron Trades,Main Store,Galaxy Explorer,40,89.99,yes,yes,ToyHouse,yes,LEGO,Sets,Space,497,35.5,2,497-1
PO-7,Trade,2025-03-01,2025-03-15,Patron Trades,Main Store,Castle,20,45,yes,yes,ToyHouse,yes,LEGO,Sets,Castle,6080,15,1,6080-1
";

    struct TestApp {
        _dir: tempfile::TempDir,
        store: Store,
        catalog: Arc<FakeCatalog>,
        router: Router,
    }

    fn app() -> TestApp {
        let (dir, conn) = test_db();
        let store = Store::new(conn);
        let catalog = Arc::new(FakeCatalog::new().with_vendor("Patron Trades", 7).with_location(3));
        let router = router(AppState {
            store: store.clone(),
            catalog: catalog.clone(),
        });
        TestApp {
            _dir: dir,
            store,
            catalog,
            router,
        }
    }

    fn seed_po(store: &Store, po: &str, pids: &[&str]) {
        let conn = store.lock().unwrap();
        let lines: Vec<_> = pids.iter().map(|pid| sample_line(po, pid)).collect();
        staging::replace_po_lines(&conn, &lines).unwrap();
        registry::mark_loaded(&conn, po).unwrap();
    }

    fn multipart_request(uri: &str, filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
Content-Type: text/csv\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(router, request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upload_po_csv_then_list() {
        let app = app();
        let (status, body) = send(&app.router, multipart_request("/api/upload-po-csv", "po.csv", PO_CSV)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "CSV data saved to database: 2 lines across 1 purchase orders."
        );

        let (status, numbers) = send_json(&app.router, get("/api/po-numbers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(numbers, json!(["PO-7"]));

        let (_, master) = send_json(&app.router, get("/api/po-import-master")).await;
        assert_eq!(master[0]["po_number"], "PO-7");
        assert_eq!(master[0]["po_import_status"], "loaded");

        let (_, items) = send_json(&app.router, get("/api/import-items?po=PO-7")).await;
        assert_eq!(items.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let app = app();
        let body = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nx\r\n--{BOUNDARY}--\r\n");
        let request = Request::builder()
            .method("POST")
            .uri("/api/upload-sets-images")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().starts_with("Failed to import CSV"));
    }

    #[tokio::test]
    async fn test_upload_images_counts_malformed_rows() {
        let app = app();
        let csv = "Bricklink ID,Image URL\n6080-1,https://img/6080.jpg\n,https://img/blank.jpg\n497-1,https://img/497.jpg\n";
        let (status, body) =
            send(&app.router, multipart_request("/api/upload-sets-images", "images.csv", csv)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(String::from_utf8(body).unwrap(), "Imported 2 of 3 records.");
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected_and_row_unchanged() {
        let app = app();
        seed_po(&app.store, "PO-1", &["1-1"]);
        let (status, body) = send_json(
            &app.router,
            json_request("/api/po-import-master/PO-1/status", json!({ "status": "archived" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("archived"));
        let conn = app.store.lock().unwrap();
        assert_eq!(registry::get(&conn, "PO-1").unwrap().unwrap().status, ImportStatus::Loaded);
    }

    #[tokio::test]
    async fn test_set_status() {
        let app = app();
        seed_po(&app.store, "PO-1", &["1-1"]);
        let (status, body) = send_json(
            &app.router,
            json_request("/api/po-import-master/PO-1/status", json!({ "status": "reviewing" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "po": "PO-1", "status": "reviewing" }));

        let (status, _) = send_json(
            &app.router,
            json_request("/api/po-import-master/PO-404/status", json!({ "status": "reviewing" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_complete_review_reports_first_failing_line() {
        let app = app();
        seed_po(&app.store, "PO-1", &["1-1", "2-1", "3-1"]);
        let lines = json!([
            { "subDepartment": "Sets" },
            { "subDepartment": "Sets" },
            { "currentPrice": 12.5 },
        ]);
        let (status, body) = send_json(
            &app.router,
            json_request("/api/po-import-master/PO-1/complete", json!({ "lines": lines })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["index"], 2);
        assert_eq!(body["field"], "subDepartment");

        let conn = app.store.lock().unwrap();
        assert_eq!(registry::get(&conn, "PO-1").unwrap().unwrap().status, ImportStatus::Loaded);
    }

    #[tokio::test]
    async fn test_complete_review_success() {
        let app = app();
        seed_po(&app.store, "PO-1", &["1-1"]);
        let (status, body) = send_json(
            &app.router,
            json_request(
                "/api/po-import-master/PO-1/complete",
                json!({ "lines": [{ "subDepartment": "Sets", "subCategory": "Loose", "currentPrice": 19.0 }] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "po": "PO-1", "status": "reviewed", "lines": 1, "unmappedSubCategories": ["1-1"] })
        );
    }

    #[tokio::test]
    async fn test_update_item_price() {
        let app = app();
        seed_po(&app.store, "PO-1", &["1-1"]);
        let line_id = {
            let conn = app.store.lock().unwrap();
            staging::lines_for_po(&conn, "PO-1").unwrap()[0].id.unwrap()
        };
        let (status, _) = send_json(
            &app.router,
            json_request(&format!("/api/import-items/{line_id}/price"), json!({ "currentPrice": 31.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send_json(
            &app.router,
            json_request("/api/import-items/9999/price", json!({ "currentPrice": 31.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send_json(
            &app.router,
            json_request(&format!("/api/import-items/{line_id}/price"), json!({ "currentPrice": null })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let conn = app.store.lock().unwrap();
        assert_eq!(staging::lines_for_po(&conn, "PO-1").unwrap()[0].current_price, Some(31.0));
    }

    #[tokio::test]
    async fn test_import_heartland_requires_lines() {
        let app = app();
        let (status, _) = send_json(
            &app.router,
            json_request("/api/import-heartland", json!({ "po": "PO-1", "vendorName": "Patron Trades", "lines": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            &app.router,
            json_request("/api/import-heartland", json!({ "po": "PO-1", "lines": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_import_heartland_returns_report() {
        let app = app();
        seed_po(&app.store, "PO-1", &["6080-1", "497-1"]);
        let request = json!({
            "po": "PO-1",
            "vendorName": "Patron Trades",
            "lines": [
                { "productIdentifier": "6080-1", "subDepartment": "Sets", "subCategory": "Boxed Set", "quantity": 1, "unitCost": 15.0 },
                { "productIdentifier": "497-1", "subDepartment": "Sets", "subCategory": "Incomplete Set", "quantity": 2, "unitCost": 30.0 },
                { "productIdentifier": "missing-1", "quantity": 1, "unitCost": 1.0 },
            ],
        });
        let (status, body) = send_json(&app.router, json_request("/api/import-heartland", request)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["poId"].as_i64().unwrap() > 0);
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["skipped"][0]["reason"], "missing_staged_line");
        assert_eq!(app.catalog.state().created.len(), 2);

        let conn = app.store.lock().unwrap();
        assert_eq!(registry::get(&conn, "PO-1").unwrap().unwrap().status, ImportStatus::Reviewed);
    }

    #[tokio::test]
    async fn test_import_heartland_unknown_vendor() {
        let app = app();
        seed_po(&app.store, "PO-1", &["6080-1"]);
        let request = json!({
            "po": "PO-1",
            "vendorName": "Nobody",
            "lines": [{ "productIdentifier": "6080-1", "quantity": 1, "unitCost": 15.0 }],
        });
        let (status, body) = send_json(&app.router, json_request("/api/import-heartland", request)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Vendor not found: Nobody");
        assert!(app.catalog.state().created.is_empty());
    }

    #[tokio::test]
    async fn test_external_failure_maps_to_bad_gateway() {
        let app = app();
        app.catalog.state().fail_order = true;
        let (status, _) = send_json(
            &app.router,
            json_request("/api/create-po", json!({ "po": "PO-9", "vendorName": "Patron Trades" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_create_po_and_add_item() {
        let app = app();
        let (status, body) = send_json(
            &app.router,
            json_request("/api/create-po", json!({ "po": "PO-9", "vendorName": "Patron Trades" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let po_id = body["purchaseOrderId"].as_i64().unwrap();

        let (status, body) = send_json(
            &app.router,
            json_request(
                "/api/add-item-to-po",
                json!({ "purchaseOrderId": po_id, "itemId": 55, "quantity": 1, "unitCost": 4.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["lineId"].as_i64().is_some());
        assert_eq!(app.catalog.state().lines[0].0, po_id);
    }
}
