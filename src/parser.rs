//! Grade extraction from the portal's journal page.
//!
//! The page is scanned once: the first `<table>`, its rows after the header,
//! and for every row with at least two cells the first cell (subject) and the
//! last cell (current grade).

use itertools::Itertools;
use scraper::{ElementRef, Html};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GradeEntry {
    pub subject: String,
    pub value: String,
}

#[derive(PartialEq, Eq, Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No table was found on the journal page.")]
    TableNotFound,
}

pub fn parse(html: &Html) -> Result<Vec<GradeEntry>, ParseError> {
    let table = html
        .select(selector!("table"))
        .next()
        .ok_or(ParseError::TableNotFound)?;
    Ok(table
        .select(selector!("tr"))
        .skip(1)
        .filter_map(parse_row)
        .collect())
}

fn parse_row(row: ElementRef) -> Option<GradeEntry> {
    let cells = row.select(selector!("td")).map(cell_text).collect_vec();
    match &cells[..] {
        [subject, .., value] => Some(GradeEntry {
            subject: subject.clone(),
            value: value.clone(),
        }),
        _ => None,
    }
}

/// Trimmed text nodes glued together, so `4<sup>+</sup>` reads `4+`.
fn cell_text(cell: ElementRef) -> String {
    cell.text().map(str::trim).collect()
}
