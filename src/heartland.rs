//! Heartland Retail API client.
//!
//! Wraps the REST endpoints the sync pipeline needs. Responses arrive either
//! as `{"results": [...]}` or as a bare array; both are unwrapped. Any non-2xx
//! status becomes [`BridgeError::ExternalApi`] with the response body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

use crate::catalog::{CatalogApi, ItemPatch, ItemPayload, NewOrderLine, NewPurchaseOrder};
use crate::error::{BridgeError, Result};
use crate::settings::HeartlandConfig;

pub struct HeartlandClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl std::fmt::Debug for HeartlandClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartlandClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HeartlandClient {
    pub fn new(config: &HeartlandConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url()?,
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        let response = builder
            .bearer_auth(&self.api_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(e, path))?;

        let status = response.status();
        debug!(path, status = status.as_u16(), "heartland response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::ExternalApi {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_results(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        debug!(path, "heartland GET");
        let response = self
            .send(self.client.get(self.url(path)).query(query), path)
            .await?;
        let body = response.text().await.map_err(|e| transport_error(e, path))?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(unwrap_results(serde_json::from_str(&body)?))
    }

    async fn send_json<T: serde::Serialize + ?Sized>(
        &self,
        builder: RequestBuilder,
        path: &str,
        body: &T,
    ) -> Result<Response> {
        self.send(builder.json(body), path).await
    }
}

fn transport_error(err: reqwest::Error, path: &str) -> BridgeError {
    if err.is_timeout() {
        BridgeError::ExternalTimeout(path.to_string())
    } else {
        BridgeError::Http(err)
    }
}

/// `{"results": [...]}` or a bare array; anything else is empty.
pub fn unwrap_results(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn first_id(results: &[Value]) -> Option<i64> {
    results.first().and_then(|v| v.get("id")).and_then(Value::as_i64)
}

/// Numeric id from the last segment of a `Location` header.
pub fn created_id(response: &Response, what: &str) -> Result<i64> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| BridgeError::MissingLocationHeader(what.to_string()))
}

#[async_trait]
impl CatalogApi for HeartlandClient {
    async fn find_vendor_id(&self, name: &str) -> Result<Option<i64>> {
        let results = self.get_results("/purchasing/vendors", &[("name", name)]).await?;
        Ok(first_id(&results))
    }

    async fn first_location_id(&self) -> Result<Option<i64>> {
        let results = self.get_results("/locations", &[]).await?;
        Ok(first_id(&results))
    }

    async fn find_item_id(&self, public_id: &str) -> Result<Option<i64>> {
        let results = self.get_results("/items", &[("public_id", public_id)]).await?;
        Ok(first_id(&results))
    }

    async fn create_item(&self, item: &ItemPayload) -> Result<()> {
        let path = "/items";
        self.send_json(self.client.post(self.url(path)), path, item).await?;
        Ok(())
    }

    async fn update_item(&self, item_id: i64, item: &ItemPayload) -> Result<()> {
        let path = format!("/items/{item_id}");
        self.send_json(self.client.put(self.url(&path)), &path, item).await?;
        Ok(())
    }

    async fn patch_item(&self, item_id: i64, patch: &ItemPatch) -> Result<()> {
        let path = format!("/items/{item_id}");
        self.send_json(self.client.put(self.url(&path)), &path, patch).await?;
        Ok(())
    }

    async fn attach_image(&self, item_id: i64, url: &str) -> Result<()> {
        let path = format!("/items/{item_id}/images");
        self.send_json(self.client.post(self.url(&path)), &path, &json!({ "url": url }))
            .await?;
        Ok(())
    }

    async fn create_purchase_order(&self, order: &NewPurchaseOrder) -> Result<i64> {
        let path = "/purchasing/orders";
        let response = self.send_json(self.client.post(self.url(path)), path, order).await?;
        created_id(&response, "create purchase order")
    }

    async fn add_order_line(&self, order_id: i64, line: &NewOrderLine) -> Result<i64> {
        let path = format!("/purchasing/orders/{order_id}/lines");
        let body = json!({
            "order_id": order_id,
            "item_id": line.item_id,
            "qty": line.qty,
            "unit_cost": line.unit_cost,
        });
        let response = self.send_json(self.client.post(self.url(&path)), &path, &body).await?;
        created_id(&response, "add purchase order line")
    }
}
