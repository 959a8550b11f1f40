use rusqlite::{Connection, OptionalExtension};

use crate::error::{BridgeError, Result};
use crate::models::{ImportMaster, ImportStatus};

fn row_to_master(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, Option<String>, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_master((po_number, po_url, status): (String, Option<String>, String)) -> Result<ImportMaster> {
    Ok(ImportMaster {
        po_number,
        po_url,
        status: status.parse()?,
    })
}

pub fn list(conn: &Connection) -> Result<Vec<ImportMaster>> {
    let mut stmt = conn.prepare(
        "SELECT po_number, po_url, po_import_status FROM po_import_master ORDER BY po_number",
    )?;
    let rows = stmt
        .query_map([], row_to_master)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(into_master).collect()
}

pub fn get(conn: &Connection, po_number: &str) -> Result<Option<ImportMaster>> {
    let row = conn
        .query_row(
            "SELECT po_number, po_url, po_import_status FROM po_import_master WHERE po_number = ?1",
            [po_number],
            row_to_master,
        )
        .optional()?;
    row.map(into_master).transpose()
}

/// Create the row for a (re-)uploaded purchase order, or reset it to `loaded`.
pub fn mark_loaded(conn: &Connection, po_number: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO po_import_master (po_number, po_import_status) VALUES (?1, 'loaded') \
         ON CONFLICT (po_number) DO UPDATE SET po_import_status = 'loaded'",
        [po_number],
    )?;
    Ok(())
}

/// Force a status regardless of the current one. Last write wins.
pub fn set_status(conn: &Connection, po_number: &str, status: ImportStatus) -> Result<()> {
    let changed = conn.execute(
        "UPDATE po_import_master SET po_import_status = ?1 WHERE po_number = ?2",
        rusqlite::params![status.as_str(), po_number],
    )?;
    if changed == 0 {
        return Err(BridgeError::PurchaseOrderNotFound(po_number.to_string()));
    }
    Ok(())
}

/// Validate a raw status name against the fixed set before writing it.
pub fn set_status_named(conn: &Connection, po_number: &str, status: &str) -> Result<ImportStatus> {
    let status: ImportStatus = status.parse()?;
    set_status(conn, po_number, status)?;
    Ok(status)
}

pub struct RegistrySummary {
    pub master: ImportMaster,
    pub line_count: i64,
    pub total_cost: f64,
}

pub fn summaries(conn: &Connection) -> Result<Vec<RegistrySummary>> {
    let mut stmt = conn.prepare(
        "SELECT m.po_number, m.po_url, m.po_import_status, \
                count(l.id), COALESCE(SUM(l.po_line_unit_cost * l.po_line_qty), 0) \
         FROM po_import_master m LEFT JOIN po_lines l ON l.po_number = m.po_number \
         GROUP BY m.po_number ORDER BY m.po_number",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row_to_master(row)?, row.get::<_, i64>(3)?, row.get::<_, f64>(4)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(raw, line_count, total_cost)| {
            Ok(RegistrySummary {
                master: into_master(raw)?,
                line_count,
                total_cost,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[test]
    fn test_list_is_ordered_by_po_number() {
        let (_dir, conn) = test_db();
        mark_loaded(&conn, "PO-200").unwrap();
        mark_loaded(&conn, "PO-100").unwrap();
        let rows = list(&conn).unwrap();
        let numbers: Vec<&str> = rows.iter().map(|r| r.po_number.as_str()).collect();
        assert_eq!(numbers, ["PO-100", "PO-200"]);
        assert!(rows.iter().all(|r| r.status == ImportStatus::Loaded));
    }

    #[test]
    fn test_reupload_resets_reviewed_to_loaded() {
        let (_dir, conn) = test_db();
        mark_loaded(&conn, "PO-1").unwrap();
        set_status(&conn, "PO-1", ImportStatus::Reviewed).unwrap();
        mark_loaded(&conn, "PO-1").unwrap();
        assert_eq!(get(&conn, "PO-1").unwrap().unwrap().status, ImportStatus::Loaded);
        assert_eq!(list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_reviewed_for_review() {
        let (_dir, conn) = test_db();
        mark_loaded(&conn, "PO-1").unwrap();
        set_status(&conn, "PO-1", ImportStatus::Reviewed).unwrap();
        set_status(&conn, "PO-1", ImportStatus::Reviewing).unwrap();
        assert_eq!(get(&conn, "PO-1").unwrap().unwrap().status, ImportStatus::Reviewing);
    }

    #[test]
    fn test_unknown_status_leaves_row_unchanged() {
        let (_dir, conn) = test_db();
        mark_loaded(&conn, "PO-1").unwrap();
        let err = set_status_named(&conn, "PO-1", "archived").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownStatus(_)));
        assert_eq!(get(&conn, "PO-1").unwrap().unwrap().status, ImportStatus::Loaded);
    }

    #[test]
    fn test_set_status_on_missing_po() {
        let (_dir, conn) = test_db();
        let err = set_status(&conn, "PO-404", ImportStatus::Reviewing).unwrap_err();
        assert!(matches!(err, BridgeError::PurchaseOrderNotFound(_)));
    }

    #[test]
    fn test_summaries_count_lines_and_cost() {
        let (_dir, conn) = test_db();
        mark_loaded(&conn, "PO-1").unwrap();
        mark_loaded(&conn, "PO-2").unwrap();
        conn.execute(
            "INSERT INTO po_lines (po_number, po_line_unit_cost, po_line_qty) VALUES ('PO-1', 10.0, 3), ('PO-1', 2.5, 2)",
            [],
        )
        .unwrap();
        let rows = summaries(&conn).unwrap();
        assert_eq!(rows[0].line_count, 2);
        assert_eq!(rows[0].total_cost, 35.0);
        assert_eq!(rows[1].line_count, 0);
        assert_eq!(rows[1].total_cost, 0.0);
    }
}
