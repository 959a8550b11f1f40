use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{BridgeError, Result};
use crate::models::{CatalogRecord, ImageRecord, StagedLine, UploadKind};
use crate::registry;
use crate::staging::{self, ReferenceTable};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `Item #` -> `item_number`, `PO Number` -> `po_number`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_").replace('#', "number")
}

fn non_numeric() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.\-]").ok()).as_ref()
}

/// Strip currency symbols and separators: `$1,234.50` -> `1234.5`.
pub fn parse_optional_number(raw: &str) -> Option<f64> {
    let cleaned = match non_numeric() {
        Some(re) => re.replace_all(raw, ""),
        None => raw.trim().into(),
    };
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_number(raw: &str) -> f64 {
    parse_optional_number(raw).unwrap_or(0.0)
}

pub fn parse_flag(raw: &str, truthy: &str) -> bool {
    raw.trim().eq_ignore_ascii_case(truthy)
}

pub fn parse_date_mdy(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(y, m, d).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Shipment window dates arrive as ISO or US-style dates.
pub fn parse_ship_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    parse_date_mdy(raw)
}

pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (normalize_header(h), i))
            .collect();
        Self { index }
    }

    fn require(&self, names: &[&str]) -> Result<()> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !self.index.contains_key(*n))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::InvalidRequest(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )))
        }
    }

    fn raw<'r>(&self, record: &'r csv::StringRecord, name: &str) -> &'r str {
        self.index
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .unwrap_or("")
    }

    fn text(&self, record: &csv::StringRecord, name: &str) -> Option<String> {
        let value = self.raw(record, name);
        (!value.is_empty()).then(|| value.to_string())
    }
}

fn reader_for<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(input)
}

fn record_upload(
    conn: &Connection,
    kind: UploadKind,
    filename: &str,
    record_count: usize,
    imported_count: usize,
    checksum: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO uploads (kind, filename, record_count, imported_count, checksum) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            kind.key(),
            filename,
            record_count as i64,
            imported_count as i64,
            checksum
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PoImportSummary {
    pub lines: usize,
    pub purchase_orders: usize,
}

impl PoImportSummary {
    pub fn message(&self) -> String {
        format!(
            "CSV data saved to database: {} lines across {} purchase orders.",
            self.lines, self.purchase_orders
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImportSummary {
    pub imported: usize,
    pub total: usize,
}

impl ReferenceImportSummary {
    pub fn message(&self) -> String {
        format!("Imported {} of {} records.", self.imported, self.total)
    }
}

// ---------------------------------------------------------------------------
// Purchase-order lines
// ---------------------------------------------------------------------------

const PO_REQUIRED: &[&str] = &["po_number", "item_bricklink_id"];

/// Parse a PO spreadsheet. Any malformed record fails the whole file.
pub fn parse_po_csv<R: Read>(input: R) -> Result<Vec<StagedLine>> {
    let mut rdr = reader_for(input);
    let cols = Columns::from_headers(rdr.headers()?);
    cols.require(PO_REQUIRED)?;

    let mut lines = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let Some(po_number) = cols.text(&record, "po_number") else {
            return Err(BridgeError::InvalidRequest(format!("row {}: missing po_number", i + 1)));
        };
        lines.push(StagedLine {
            id: None,
            po_number,
            po_description: cols.text(&record, "po_description"),
            start_ship: parse_ship_date(cols.raw(&record, "po_start_ship")),
            end_ship: parse_ship_date(cols.raw(&record, "po_end_ship")),
            vendor: cols.text(&record, "po_vendor"),
            receive_location: cols.text(&record, "po_received_at_location"),
            description: cols.text(&record, "item_description"),
            default_cost: parse_number(cols.raw(&record, "item_default_cost")),
            current_price: parse_optional_number(cols.raw(&record, "item_current_price")),
            active: parse_flag(cols.raw(&record, "item_active"), "yes"),
            track_inventory: parse_flag(cols.raw(&record, "item_track_inventory"), "yes"),
            primary_vendor: cols.text(&record, "item_primary_vendor"),
            taxable: parse_flag(cols.raw(&record, "item_taxable"), "yes"),
            department: cols.text(&record, "item_department"),
            category: cols.text(&record, "item_category"),
            series: cols.text(&record, "item_series"),
            product_number: cols.raw(&record, "item_number").to_string(),
            unit_cost: parse_number(cols.raw(&record, "po_line_unit_cost")),
            quantity: parse_number(cols.raw(&record, "po_line_qty")) as i64,
            product_identifier: cols.raw(&record, "item_bricklink_id").to_string(),
        });
    }
    Ok(lines)
}

/// Replace all staged lines and reset every imported PO to `loaded`.
pub fn import_po_csv(conn: &Connection, filename: &str, data: &[u8]) -> Result<PoImportSummary> {
    let lines = parse_po_csv(data)?;
    let inserted = staging::replace_po_lines(conn, &lines)?;

    let purchase_orders: BTreeSet<&str> = lines.iter().map(|l| l.po_number.as_str()).collect();
    for po in &purchase_orders {
        registry::mark_loaded(conn, po)?;
    }
    record_upload(conn, UploadKind::PurchaseOrder, filename, lines.len(), inserted, &compute_checksum(data))?;

    info!(filename, lines = inserted, purchase_orders = purchase_orders.len(), "imported PO lines");
    Ok(PoImportSummary {
        lines: inserted,
        purchase_orders: purchase_orders.len(),
    })
}

// ---------------------------------------------------------------------------
// Catalog reference
// ---------------------------------------------------------------------------

fn catalog_record(cols: &Columns, record: &csv::StringRecord) -> Option<CatalogRecord> {
    let product_identifier = cols.text(record, "bricklink_id")?;
    Some(CatalogRecord {
        brand: cols.text(record, "brand"),
        item_number: cols.text(record, "item_number"),
        description: cols.text(record, "description"),
        product_identifier,
        department: cols.text(record, "department"),
        sub_department: cols.text(record, "sub_department"),
        category: cols.text(record, "bam_category"),
        theme: cols.text(record, "theme"),
        long_description: cols.text(record, "long_description"),
        primary_vendor: cols.text(record, "primary_vendor"),
        sell_online: parse_flag(cols.raw(record, "sell_on_shopify"), "yes"),
        tags: cols.text(record, "shopify_tags"),
        active: parse_flag(cols.raw(record, "active"), "true"),
        msrp: parse_number(cols.raw(record, "msrp")),
        default_cost: parse_number(cols.raw(record, "default_cost")),
        current_price: parse_number(cols.raw(record, "current_price")),
        taxable: parse_flag(cols.raw(record, "taxable"), "yes"),
        upc: cols.text(record, "upc"),
        height: parse_number(cols.raw(record, "height")),
        width: parse_number(cols.raw(record, "width")),
        depth: parse_number(cols.raw(record, "depth")),
        weight: parse_number(cols.raw(record, "weight")),
        weight_in_oz: parse_number(cols.raw(record, "weight_in_oz")),
        image_1: cols.text(record, "image_1"),
        image_2: cols.text(record, "image_2"),
        image_3: cols.text(record, "image_3"),
    })
}

// A row without a URL would shadow the catalog image with nothing.
fn image_record(cols: &Columns, record: &csv::StringRecord) -> Option<ImageRecord> {
    Some(ImageRecord {
        product_identifier: cols.text(record, "bricklink_id")?,
        image_url: cols.text(record, "image_url")?,
    })
}

/// Load a reference spreadsheet into a fresh generation, skipping and
/// counting rows that fail to parse or insert.
fn import_reference<R, T, P, I>(
    conn: &Connection,
    input: R,
    table: ReferenceTable,
    required: &[&str],
    parse: P,
    insert: I,
) -> Result<ReferenceImportSummary>
where
    R: Read,
    P: Fn(&Columns, &csv::StringRecord) -> Option<T>,
    I: Fn(&Connection, i64, &T) -> Result<()>,
{
    let mut rdr = reader_for(input);
    let cols = Columns::from_headers(rdr.headers()?);
    cols.require(required)?;

    let generation = staging::begin_generation(conn, table)?;
    let mut total = 0usize;
    let mut imported = 0usize;
    for result in rdr.records() {
        total += 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(row = total, error = %e, "skipped malformed reference row");
                continue;
            }
        };
        let Some(parsed) = parse(&cols, &record) else {
            warn!(row = total, "skipped reference row missing a required value");
            continue;
        };
        match insert(conn, generation, &parsed) {
            Ok(()) => imported += 1,
            Err(e) => warn!(row = total, error = %e, "skipped reference row"),
        }
    }
    staging::publish_generation(conn, table, generation)?;
    Ok(ReferenceImportSummary { imported, total })
}

pub fn import_catalog_csv(conn: &Connection, filename: &str, data: &[u8]) -> Result<ReferenceImportSummary> {
    let summary = import_reference(
        conn,
        data,
        ReferenceTable::Catalog,
        &["bricklink_id"],
        catalog_record,
        staging::insert_catalog_record,
    )?;
    record_upload(conn, UploadKind::Catalog, filename, summary.total, summary.imported, &compute_checksum(data))?;
    info!(filename, imported = summary.imported, total = summary.total, "imported catalog reference");
    Ok(summary)
}

pub fn import_images_csv(conn: &Connection, filename: &str, data: &[u8]) -> Result<ReferenceImportSummary> {
    let summary = import_reference(
        conn,
        data,
        ReferenceTable::Images,
        &["bricklink_id", "image_url"],
        image_record,
        staging::insert_image_record,
    )?;
    record_upload(conn, UploadKind::Images, filename, summary.total, summary.imported, &compute_checksum(data))?;
    info!(filename, imported = summary.imported, total = summary.total, "imported image reference");
    Ok(summary)
}

/// Import a file from disk; returns the same message the upload endpoints send.
pub fn import_file(conn: &Connection, kind: UploadKind, file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let filename = file_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let message = match kind {
        UploadKind::PurchaseOrder => import_po_csv(conn, filename, &data)?.message(),
        UploadKind::Catalog => import_catalog_csv(conn, filename, &data)?.message(),
        UploadKind::Images => import_images_csv(conn, filename, &data)?.message(),
    };
    Ok(message)
}
