use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::{money, status_label};
use crate::registry;
use crate::settings::load_effective_settings;
use crate::staging::{self, ReferenceTable};

pub fn run() -> Result<()> {
    let settings = load_effective_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `po-bridge init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    println!("Catalog:    {} records", staging::reference_count(&conn, ReferenceTable::Catalog)?);
    println!("Images:     {} records", staging::reference_count(&conn, ReferenceTable::Images)?);
    println!();

    let summaries = registry::summaries(&conn)?;
    if summaries.is_empty() {
        println!("No purchase orders staged.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["PO", "Status", "Lines", "Cost"]);
    for s in &summaries {
        table.add_row(vec![
            Cell::new(&s.master.po_number),
            Cell::new(status_label(s.master.status)),
            Cell::new(s.line_count),
            Cell::new(money(s.total_cost)),
        ]);
    }
    println!("{table}");
    Ok(())
}
