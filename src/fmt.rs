use colored::{ColoredString, Colorize};

use crate::models::ImportStatus;

/// Dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((&cents, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if val < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac}")
}

pub fn status_label(status: ImportStatus) -> ColoredString {
    match status {
        ImportStatus::Loaded => status.as_str().yellow(),
        ImportStatus::Reviewing => status.as_str().cyan(),
        ImportStatus::Reviewed => status.as_str().green(),
    }
}
