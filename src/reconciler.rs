use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{BridgeError, Result};
use crate::models::{ImportStatus, LineField, ReviewSelection, StagedLine};
use crate::registry;
use crate::staging;

// (sub-category, public identifier suffix)
const CLASSIFICATION_SUFFIXES: &[(&str, &str)] = &[
    ("Pre-Built Set", "-1"),
    ("Project Set", "-project"),
    ("Allowance Set", "-allowance"),
    ("Boxed Set", "-2"),
    ("Polybag or Paper Bag", "-2"),
    ("Incomplete Set", "-3"),
    ("Certified Used Set", "-cert"),
];

/// Suffix appended to a product number for the chosen sub-category.
/// Unmapped or missing sub-categories get no suffix.
pub fn classification_suffix(sub_category: Option<&str>) -> &'static str {
    let Some(sub_category) = sub_category else {
        return "";
    };
    CLASSIFICATION_SUFFIXES
        .iter()
        .find(|(name, _)| *name == sub_category.trim())
        .map(|(_, suffix)| *suffix)
        .unwrap_or("")
}

pub fn public_identifier(product_number: &str, sub_category: Option<&str>) -> String {
    format!("{product_number}{}", classification_suffix(sub_category))
}

fn effective_price(line: &StagedLine, selection: Option<&ReviewSelection>) -> Option<f64> {
    selection
        .and_then(|s| s.current_price)
        .or(line.current_price)
        .filter(|p| p.is_finite())
}

/// Check every line in order and stop at the first one missing a price or a
/// sub-department.
pub fn validate(lines: &[StagedLine], selections: &[ReviewSelection]) -> Result<()> {
    for (index, line) in lines.iter().enumerate() {
        let selection = selections.get(index);
        if effective_price(line, selection).is_none() {
            return Err(BridgeError::LineValidation { index, field: LineField::Price });
        }
        let has_sub_department = selection
            .and_then(|s| s.sub_department.as_deref())
            .is_some_and(|d| !d.trim().is_empty());
        if !has_sub_department {
            return Err(BridgeError::LineValidation {
                index,
                field: LineField::SubDepartment,
            });
        }
    }
    Ok(())
}

/// Product identifiers whose chosen sub-category has no suffix, so their
/// public identifier will be the bare product number.
pub fn unmapped_sub_categories(lines: &[StagedLine], selections: &[ReviewSelection]) -> Vec<String> {
    lines
        .iter()
        .zip(selections)
        .filter(|(_, s)| {
            s.sub_category
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty() && classification_suffix(Some(c)).is_empty())
        })
        .map(|(line, _)| line.product_identifier.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub lines: usize,
    pub unmapped: Vec<String>,
}

/// Validate the reviewer's selections for a PO, write their prices back and
/// mark the PO `reviewed`. Nothing is written when validation fails.
pub fn complete_review(conn: &Connection, po_number: &str, selections: &[ReviewSelection]) -> Result<ReviewOutcome> {
    if registry::get(conn, po_number)?.is_none() {
        return Err(BridgeError::PurchaseOrderNotFound(po_number.to_string()));
    }
    let lines = staging::lines_for_po(conn, po_number)?;
    validate(&lines, selections)?;

    for (line, selection) in lines.iter().zip(selections) {
        if let (Some(id), Some(price)) = (line.id, selection.current_price) {
            staging::update_price(conn, id, price)?;
        }
    }
    registry::set_status(conn, po_number, ImportStatus::Reviewed)?;

    let unmapped = unmapped_sub_categories(&lines, selections);
    if !unmapped.is_empty() {
        warn!(po = po_number, products = ?unmapped, "sub-category has no public id suffix");
    }
    info!(po = po_number, lines = lines.len(), "review completed");
    Ok(ReviewOutcome {
        lines: lines.len(),
        unmapped,
    })
}
