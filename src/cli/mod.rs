pub mod import;
pub mod init;
pub mod serve;
pub mod set_status;
pub mod status;

use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::{BridgeError, Result};
use crate::models::UploadKind;
use crate::settings::load_effective_settings;

/// Open the configured database, refusing to create one outside `init`.
pub(crate) fn open_db() -> Result<Connection> {
    let settings = load_effective_settings();
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(BridgeError::Settings(format!(
            "database not found at {}. Run `po-bridge init` to set up.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    Ok(conn)
}

#[derive(Parser)]
#[command(
    name = "po-bridge",
    version,
    about = "Stage trade-in purchase orders, review them and push them to Heartland Retail."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and create the database.
    Init {
        /// Path for po-bridge data (default: ~/.local/share/po-bridge)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Run the HTTP API.
    Serve {
        /// Address to listen on (default from settings or PORT)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Import a CSV file from disk.
    Import {
        /// Which spreadsheet this is
        #[arg(value_enum)]
        kind: ImportKind,
        /// Path to the CSV file
        file: String,
    },
    /// List staged purchase orders with their review status.
    Status,
    /// Force the review status of a purchase order.
    SetStatus {
        /// PO number
        po: String,
        /// One of: loaded, reviewing, reviewed
        status: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportKind {
    /// Purchase order lines
    Po,
    /// ToyHouse catalog export
    Catalog,
    /// Set image URLs
    Images,
}

impl From<ImportKind> for UploadKind {
    fn from(kind: ImportKind) -> Self {
        match kind {
            ImportKind::Po => UploadKind::PurchaseOrder,
            ImportKind::Catalog => UploadKind::Catalog,
            ImportKind::Images => UploadKind::Images,
        }
    }
}
