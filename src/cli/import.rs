use std::path::PathBuf;

use crate::cli::{open_db, ImportKind};
use crate::error::Result;
use crate::importer::import_file;

pub fn run(kind: ImportKind, file: &str) -> Result<()> {
    let conn = open_db()?;
    let message = import_file(&conn, kind.into(), &PathBuf::from(file))?;
    println!("{message}");
    Ok(())
}
