use crate::cli::open_db;
use crate::error::Result;
use crate::registry::set_status_named;

pub fn run(po: &str, status: &str) -> Result<()> {
    let conn = open_db()?;
    let status = set_status_named(&conn, po, status)?;
    println!("{po} \u{2192} {status}");
    Ok(())
}
