//! Staging store: imported purchase-order lines plus the catalog and image
//! reference tables used to enrich them.
//!
//! Reference tables are generational. An upload writes its rows under a new
//! generation number and only then points `reference_generations` at it, so
//! readers never see a half-replaced table.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{BridgeError, Result};
use crate::models::{CatalogRecord, Enrichment, ImageRecord, ImportItem, StagedLine};

const LINE_COLUMNS: &str = "id, po_number, po_description, po_start_ship, po_end_ship, po_vendor, \
    po_received_at_location, item_description, item_default_cost, item_current_price, item_active, \
    item_track_inventory, item_primary_vendor, item_taxable, item_department, item_category, \
    item_series, item_number, po_line_unit_cost, po_line_qty, item_bricklink_id";

fn row_to_line(row: &rusqlite::Row<'_>) -> rusqlite::Result<StagedLine> {
    Ok(StagedLine {
        id: row.get(0)?,
        po_number: row.get(1)?,
        po_description: row.get(2)?,
        start_ship: row.get(3)?,
        end_ship: row.get(4)?,
        vendor: row.get(5)?,
        receive_location: row.get(6)?,
        description: row.get(7)?,
        default_cost: row.get(8)?,
        current_price: row.get(9)?,
        active: row.get(10)?,
        track_inventory: row.get(11)?,
        primary_vendor: row.get(12)?,
        taxable: row.get(13)?,
        department: row.get(14)?,
        category: row.get(15)?,
        series: row.get(16)?,
        product_number: row.get(17)?,
        unit_cost: row.get(18)?,
        quantity: row.get(19)?,
        product_identifier: row.get(20)?,
    })
}

// ---------------------------------------------------------------------------
// Purchase-order lines
// ---------------------------------------------------------------------------

/// Replace every staged line with `lines`. Stops at the first failed insert.
pub fn replace_po_lines(conn: &Connection, lines: &[StagedLine]) -> Result<usize> {
    conn.execute("DELETE FROM po_lines", [])?;
    let mut stmt = conn.prepare(
        "INSERT INTO po_lines \
            (po_number, po_description, po_start_ship, po_end_ship, po_vendor, \
             po_received_at_location, item_description, item_default_cost, item_current_price, \
             item_active, item_track_inventory, item_primary_vendor, item_taxable, \
             item_department, item_category, item_series, item_number, po_line_unit_cost, \
             po_line_qty, item_bricklink_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
    )?;
    for line in lines {
        stmt.execute(rusqlite::params![
            line.po_number,
            line.po_description,
            line.start_ship,
            line.end_ship,
            line.vendor,
            line.receive_location,
            line.description,
            line.default_cost,
            line.current_price,
            line.active,
            line.track_inventory,
            line.primary_vendor,
            line.taxable,
            line.department,
            line.category,
            line.series,
            line.product_number,
            line.unit_cost,
            line.quantity,
            line.product_identifier,
        ])?;
    }
    Ok(lines.len())
}

pub fn po_numbers(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT po_number FROM po_lines ORDER BY po_number")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn lines_for_po(conn: &Connection, po_number: &str) -> Result<Vec<StagedLine>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LINE_COLUMNS} FROM po_lines WHERE po_number = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([po_number], row_to_line)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// First staged line for a product on a purchase order.
pub fn find_line(conn: &Connection, po_number: &str, product_identifier: &str) -> Result<Option<StagedLine>> {
    let line = conn
        .query_row(
            &format!(
                "SELECT {LINE_COLUMNS} FROM po_lines \
                 WHERE po_number = ?1 AND item_bricklink_id = ?2 ORDER BY id LIMIT 1"
            ),
            [po_number, product_identifier],
            row_to_line,
        )
        .optional()?;
    Ok(line)
}

/// Any one staged line of a purchase order (lowest id), used for header fields.
pub fn first_line_for_po(conn: &Connection, po_number: &str) -> Result<Option<StagedLine>> {
    let line = conn
        .query_row(
            &format!("SELECT {LINE_COLUMNS} FROM po_lines WHERE po_number = ?1 ORDER BY id LIMIT 1"),
            [po_number],
            row_to_line,
        )
        .optional()?;
    Ok(line)
}

pub fn update_price(conn: &Connection, line_id: i64, price: f64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE po_lines SET item_current_price = ?1 WHERE id = ?2",
        rusqlite::params![price, line_id],
    )?;
    if changed == 0 {
        return Err(BridgeError::LineNotFound(line_id));
    }
    Ok(())
}

/// Staged lines with their resolved image, optionally limited to one PO.
pub fn import_items(conn: &Connection, po_number: Option<&str>) -> Result<Vec<ImportItem>> {
    let lines = match po_number {
        Some(po) => lines_for_po(conn, po)?,
        None => {
            let mut stmt = conn.prepare(&format!("SELECT {LINE_COLUMNS} FROM po_lines ORDER BY id"))?;
            let rows = stmt
                .query_map([], row_to_line)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    lines
        .into_iter()
        .map(|line| {
            let image_url = resolve_image(conn, &line.product_identifier)?;
            Ok(ImportItem { line, image_url })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reference tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTable {
    Catalog,
    Images,
}

impl ReferenceTable {
    fn key(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Images => "images",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog_reference",
            Self::Images => "image_reference",
        }
    }
}

pub fn current_generation(conn: &Connection, table: ReferenceTable) -> Result<Option<i64>> {
    let current = conn
        .query_row(
            "SELECT current FROM reference_generations WHERE kind = ?1",
            [table.key()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(current)
}

/// Allocate a generation number no reader can see yet.
pub fn begin_generation(conn: &Connection, table: ReferenceTable) -> Result<i64> {
    let highest: i64 = conn.query_row(
        &format!("SELECT COALESCE(MAX(generation), 0) FROM {}", table.table()),
        [],
        |row| row.get(0),
    )?;
    let current = current_generation(conn, table)?.unwrap_or(0);
    Ok(highest.max(current) + 1)
}

/// Point readers at `generation` and drop every other generation's rows.
pub fn publish_generation(conn: &Connection, table: ReferenceTable, generation: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO reference_generations (kind, current) VALUES (?1, ?2) \
         ON CONFLICT (kind) DO UPDATE SET current = excluded.current",
        rusqlite::params![table.key(), generation],
    )?;
    conn.execute(
        &format!("DELETE FROM {} WHERE generation <> ?1", table.table()),
        [generation],
    )?;
    Ok(())
}

pub fn insert_catalog_record(conn: &Connection, generation: i64, rec: &CatalogRecord) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO catalog_reference \
            (generation, brand, item_number, description, bricklink_id, department, sub_department, \
             bam_category, theme, long_description, primary_vendor, sell_on_shopify, shopify_tags, \
             active, msrp, default_cost, current_price, taxable, upc, height, width, depth, weight, \
             weight_in_oz, image_1, image_2, image_3) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
                 ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)",
    )?;
    stmt.execute(rusqlite::params![
        generation,
        rec.brand,
        rec.item_number,
        rec.description,
        rec.product_identifier,
        rec.department,
        rec.sub_department,
        rec.category,
        rec.theme,
        rec.long_description,
        rec.primary_vendor,
        rec.sell_online,
        rec.tags,
        rec.active,
        rec.msrp,
        rec.default_cost,
        rec.current_price,
        rec.taxable,
        rec.upc,
        rec.height,
        rec.width,
        rec.depth,
        rec.weight,
        rec.weight_in_oz,
        rec.image_1,
        rec.image_2,
        rec.image_3,
    ])?;
    Ok(())
}

pub fn insert_image_record(conn: &Connection, generation: i64, rec: &ImageRecord) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO image_reference (generation, bricklink_id, image_url) VALUES (?1, ?2, ?3)",
    )?;
    stmt.execute(rusqlite::params![generation, rec.product_identifier, rec.image_url])?;
    Ok(())
}

pub fn reference_count(conn: &Connection, table: ReferenceTable) -> Result<i64> {
    let Some(generation) = current_generation(conn, table)? else {
        return Ok(0);
    };
    let count = conn.query_row(
        &format!("SELECT count(*) FROM {} WHERE generation = ?1", table.table()),
        [generation],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Tags, category and theme from the catalog; empty when the product is unknown.
pub fn enrichment(conn: &Connection, product_identifier: &str) -> Result<Enrichment> {
    let Some(generation) = current_generation(conn, ReferenceTable::Catalog)? else {
        return Ok(Enrichment::default());
    };
    let found = conn
        .query_row(
            "SELECT shopify_tags, bam_category, theme FROM catalog_reference \
             WHERE generation = ?1 AND bricklink_id = ?2 ORDER BY id LIMIT 1",
            rusqlite::params![generation, product_identifier],
            |row| {
                Ok(Enrichment {
                    tags: row.get(0)?,
                    category: row.get(1)?,
                    theme: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(found.unwrap_or_default())
}

/// Preferred image for a product: the image reference first, then the
/// catalog's primary image.
pub fn resolve_image(conn: &Connection, product_identifier: &str) -> Result<Option<String>> {
    if let Some(generation) = current_generation(conn, ReferenceTable::Images)? {
        let url: Option<String> = conn
            .query_row(
                "SELECT image_url FROM image_reference \
                 WHERE generation = ?1 AND bricklink_id = ?2 AND image_url <> '' ORDER BY id LIMIT 1",
                rusqlite::params![generation, product_identifier],
                |row| row.get(0),
            )
            .optional()?;
        if url.is_some() {
            return Ok(url);
        }
    }
    if let Some(generation) = current_generation(conn, ReferenceTable::Catalog)? {
        let url: Option<Option<String>> = conn
            .query_row(
                "SELECT image_1 FROM catalog_reference \
                 WHERE generation = ?1 AND bricklink_id = ?2 ORDER BY id LIMIT 1",
                rusqlite::params![generation, product_identifier],
                |row| row.get(0),
            )
            .optional()?;
        return Ok(url.flatten().filter(|u| !u.is_empty()));
    }
    Ok(None)
}

#[cfg(test)]
pub(crate) fn sample_line(po_number: &str, product_identifier: &str) -> StagedLine {
    StagedLine {
        id: None,
        po_number: po_number.to_string(),
        po_description: Some(format!("Trade {po_number}")),
        start_ship: Some("2025-03-01".to_string()),
        end_ship: Some("2025-03-15".to_string()),
        vendor: Some("Patron Trades".to_string()),
        receive_location: Some("Main Store".to_string()),
        description: Some(format!("Set {product_identifier}")),
        default_cost: 10.0,
        current_price: Some(24.99),
        active: true,
        track_inventory: true,
        primary_vendor: Some("Patron Trades".to_string()),
        taxable: true,
        department: Some("LEGO".to_string()),
        category: Some("Sets".to_string()),
        series: Some("Star Wars".to_string()),
        product_number: product_identifier.split('-').next().unwrap_or_default().to_string(),
        unit_cost: 8.5,
        quantity: 1,
        product_identifier: product_identifier.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn catalog(product_identifier: &str, image: Option<&str>) -> CatalogRecord {
        CatalogRecord {
            product_identifier: product_identifier.to_string(),
            tags: Some("retired".to_string()),
            category: Some("Building Sets".to_string()),
            theme: Some("Castle".to_string()),
            image_1: image.map(str::to_string),
            ..Default::default()
        }
    }

    fn load_catalog(conn: &Connection, records: &[CatalogRecord]) {
        let generation = begin_generation(conn, ReferenceTable::Catalog).unwrap();
        for rec in records {
            insert_catalog_record(conn, generation, rec).unwrap();
        }
        publish_generation(conn, ReferenceTable::Catalog, generation).unwrap();
    }

    fn load_images(conn: &Connection, records: &[(&str, &str)]) {
        let generation = begin_generation(conn, ReferenceTable::Images).unwrap();
        for (id, url) in records {
            let rec = ImageRecord {
                product_identifier: id.to_string(),
                image_url: url.to_string(),
            };
            insert_image_record(conn, generation, &rec).unwrap();
        }
        publish_generation(conn, ReferenceTable::Images, generation).unwrap();
    }

    #[test]
    fn test_replace_po_lines_is_wholesale() {
        let (_dir, conn) = test_db();
        replace_po_lines(&conn, &[sample_line("PO-1", "6080-1"), sample_line("PO-1", "6081-1")]).unwrap();
        replace_po_lines(&conn, &[sample_line("PO-2", "375-2")]).unwrap();
        assert_eq!(po_numbers(&conn).unwrap(), ["PO-2"]);
        assert!(lines_for_po(&conn, "PO-1").unwrap().is_empty());
    }

    #[test]
    fn test_po_numbers_distinct_and_sorted() {
        let (_dir, conn) = test_db();
        replace_po_lines(
            &conn,
            &[sample_line("PO-9", "1-1"), sample_line("PO-3", "2-1"), sample_line("PO-9", "3-1")],
        )
        .unwrap();
        assert_eq!(po_numbers(&conn).unwrap(), ["PO-3", "PO-9"]);
    }

    #[test]
    fn test_repeated_products_are_kept() {
        let (_dir, conn) = test_db();
        replace_po_lines(&conn, &[sample_line("PO-1", "6080-1"), sample_line("PO-1", "6080-1")]).unwrap();
        assert_eq!(lines_for_po(&conn, "PO-1").unwrap().len(), 2);
        let first = find_line(&conn, "PO-1", "6080-1").unwrap().unwrap();
        assert_eq!(first.id, Some(1));
    }

    #[test]
    fn test_find_line_missing() {
        let (_dir, conn) = test_db();
        replace_po_lines(&conn, &[sample_line("PO-1", "6080-1")]).unwrap();
        assert!(find_line(&conn, "PO-1", "9999-1").unwrap().is_none());
        assert!(find_line(&conn, "PO-2", "6080-1").unwrap().is_none());
    }

    #[test]
    fn test_update_price() {
        let (_dir, conn) = test_db();
        replace_po_lines(&conn, &[sample_line("PO-1", "6080-1")]).unwrap();
        update_price(&conn, 1, 42.0).unwrap();
        let line = first_line_for_po(&conn, "PO-1").unwrap().unwrap();
        assert_eq!(line.current_price, Some(42.0));
        assert!(matches!(update_price(&conn, 99, 1.0), Err(BridgeError::LineNotFound(99))));
    }

    #[test]
    fn test_image_reference_overrides_catalog_image() {
        let (_dir, conn) = test_db();
        load_catalog(&conn, &[catalog("6080-1", Some("https://img/catalog.jpg"))]);
        assert_eq!(resolve_image(&conn, "6080-1").unwrap().as_deref(), Some("https://img/catalog.jpg"));
        load_images(&conn, &[("6080-1", "https://img/preferred.jpg")]);
        assert_eq!(resolve_image(&conn, "6080-1").unwrap().as_deref(), Some("https://img/preferred.jpg"));
        assert_eq!(resolve_image(&conn, "1234-1").unwrap(), None);
    }

    #[test]
    fn test_import_items_filters_by_po_and_resolves_images() {
        let (_dir, conn) = test_db();
        replace_po_lines(&conn, &[sample_line("PO-1", "6080-1"), sample_line("PO-2", "375-2")]).unwrap();
        load_images(&conn, &[("375-2", "https://img/375.jpg")]);
        let all = import_items(&conn, None).unwrap();
        assert_eq!(all.len(), 2);
        let po2 = import_items(&conn, Some("PO-2")).unwrap();
        assert_eq!(po2.len(), 1);
        assert_eq!(po2[0].image_url.as_deref(), Some("https://img/375.jpg"));
    }

    #[test]
    fn test_enrichment_absent_is_empty() {
        let (_dir, conn) = test_db();
        assert_eq!(enrichment(&conn, "6080-1").unwrap(), Enrichment::default());
        load_catalog(&conn, &[catalog("6080-1", None)]);
        let found = enrichment(&conn, "6080-1").unwrap();
        assert_eq!(found.theme.as_deref(), Some("Castle"));
        assert_eq!(enrichment(&conn, "1-1").unwrap(), Enrichment::default());
    }

    #[test]
    fn test_unpublished_generation_is_invisible() {
        let (_dir, conn) = test_db();
        load_catalog(&conn, &[catalog("6080-1", None), catalog("6081-1", None)]);
        let next = begin_generation(&conn, ReferenceTable::Catalog).unwrap();
        insert_catalog_record(&conn, next, &catalog("9999-1", None)).unwrap();
        assert_eq!(reference_count(&conn, ReferenceTable::Catalog).unwrap(), 2);
        assert_eq!(enrichment(&conn, "9999-1").unwrap(), Enrichment::default());
        publish_generation(&conn, ReferenceTable::Catalog, next).unwrap();
        assert_eq!(reference_count(&conn, ReferenceTable::Catalog).unwrap(), 1);
        let rows: i64 = conn
            .query_row("SELECT count(*) FROM catalog_reference", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
