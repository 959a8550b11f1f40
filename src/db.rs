use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{BridgeError, Result};

pub const DB_FILE: &str = "po-bridge.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS po_lines (
    id INTEGER PRIMARY KEY,
    po_number TEXT NOT NULL,
    po_description TEXT,
    po_start_ship TEXT,
    po_end_ship TEXT,
    po_vendor TEXT,
    po_received_at_location TEXT,
    item_description TEXT,
    item_default_cost REAL NOT NULL DEFAULT 0,
    item_current_price REAL,
    item_active INTEGER NOT NULL DEFAULT 0,
    item_track_inventory INTEGER NOT NULL DEFAULT 0,
    item_primary_vendor TEXT,
    item_taxable INTEGER NOT NULL DEFAULT 0,
    item_department TEXT,
    item_category TEXT,
    item_series TEXT,
    item_number TEXT NOT NULL DEFAULT '',
    po_line_unit_cost REAL NOT NULL DEFAULT 0,
    po_line_qty INTEGER NOT NULL DEFAULT 0,
    item_bricklink_id TEXT NOT NULL DEFAULT '',
    uploaded_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_po_lines_po ON po_lines (po_number, item_bricklink_id);

CREATE TABLE IF NOT EXISTS reference_generations (
    kind TEXT PRIMARY KEY,
    current INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS catalog_reference (
    id INTEGER PRIMARY KEY,
    generation INTEGER NOT NULL,
    brand TEXT,
    item_number TEXT,
    description TEXT,
    bricklink_id TEXT NOT NULL,
    department TEXT,
    sub_department TEXT,
    bam_category TEXT,
    theme TEXT,
    long_description TEXT,
    primary_vendor TEXT,
    sell_on_shopify INTEGER NOT NULL DEFAULT 0,
    shopify_tags TEXT,
    active INTEGER NOT NULL DEFAULT 0,
    msrp REAL NOT NULL DEFAULT 0,
    default_cost REAL NOT NULL DEFAULT 0,
    current_price REAL NOT NULL DEFAULT 0,
    taxable INTEGER NOT NULL DEFAULT 0,
    upc TEXT,
    height REAL NOT NULL DEFAULT 0,
    width REAL NOT NULL DEFAULT 0,
    depth REAL NOT NULL DEFAULT 0,
    weight REAL NOT NULL DEFAULT 0,
    weight_in_oz REAL NOT NULL DEFAULT 0,
    image_1 TEXT,
    image_2 TEXT,
    image_3 TEXT,
    uploaded_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_catalog_reference_key ON catalog_reference (generation, bricklink_id);

CREATE TABLE IF NOT EXISTS image_reference (
    id INTEGER PRIMARY KEY,
    generation INTEGER NOT NULL,
    bricklink_id TEXT NOT NULL,
    image_url TEXT NOT NULL,
    uploaded_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_image_reference_key ON image_reference (generation, bricklink_id);

CREATE TABLE IF NOT EXISTS po_import_master (
    po_number TEXT PRIMARY KEY,
    po_url TEXT,
    po_import_status TEXT NOT NULL DEFAULT 'loaded'
        CHECK (po_import_status IN ('loaded', 'reviewing', 'reviewed'))
);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    kind TEXT NOT NULL,
    filename TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    imported_count INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    uploaded_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Shared handle to the database for the HTTP server.
///
/// Every query runs on a plain `&Connection`; callers take the lock, run
/// their statements, and drop the guard before awaiting anything.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BridgeError::Other("database lock poisoned".to_string()))
    }
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}
