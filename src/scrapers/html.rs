//! HTML table extraction shared by the registry scrapers.
//!
//! Registries publish their notices as plain `<table>`s whose column order
//! changes from time to time, so columns are located by header text rather
//! than by position.

use crate::utils::collapse;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("static selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("static selector"));
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th").expect("static selector"));
static DATA_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("static selector"));

/// A parsed table: header texts plus the text of every data row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of the first header that satisfies `pred` (given lowercased text).
    pub fn column(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| pred(h.to_lowercase().as_str()))
    }

    /// Index of the first header containing `needle` (case-insensitive).
    pub fn column_containing(&self, needle: &str) -> Option<usize> {
        let needle = needle.to_lowercase();
        self.column(|h| h.contains(&needle))
    }
}

/// Text of a cell in `row`, or empty when the column is unknown or the row is short.
pub fn cell(row: &[String], column: Option<usize>) -> String {
    column
        .and_then(|idx| row.get(idx))
        .cloned()
        .unwrap_or_default()
}

/// Visible text of an element with whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse(&el.text().collect::<Vec<_>>().join(" "))
}

/// Extract every table in the document.
///
/// Header cells come from the first row containing `<th>`; every row with
/// `<td>` cells becomes a data row.
pub fn extract_tables(html: &str) -> Vec<Table> {
    let document = Html::parse_document(html);
    document
        .select(&TABLE)
        .map(|table| {
            let mut parsed = Table::default();
            for row in table.select(&ROW) {
                let cells: Vec<String> = row.select(&DATA_CELL).map(element_text).collect();
                if !cells.is_empty() {
                    parsed.rows.push(cells);
                } else if parsed.headers.is_empty() {
                    parsed.headers = row.select(&HEADER_CELL).map(element_text).collect();
                }
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <html><body>
        <table id="layout"><tr><td>nav</td></tr></table>
        <table id="breaches">
          <thead><tr><th>Expand All</th><th>Name of Covered Entity</th><th>State</th></tr></thead>
          <tbody>
            <tr><td></td><td>Acme   Health</td><td>TX</td></tr>
            <tr><td></td><td>Beta Clinic</td></tr>
          </tbody>
        </table>
        </body></html>"#;

    #[test]
    fn test_extract_tables() {
        let tables = extract_tables(FIXTURE);
        assert_eq!(tables.len(), 2);
        assert!(tables[0].headers.is_empty());

        let table = &tables[1];
        let name = table.column_containing("covered entity");
        let state = table.column(|h| h == "state");
        assert_eq!(name, Some(1));
        assert_eq!(state, Some(2));
        assert_eq!(cell(&table.rows[0], name), "Acme Health");
        assert_eq!(cell(&table.rows[0], state), "TX");
        assert_eq!(cell(&table.rows[1], state), "");
        assert_eq!(cell(&table.rows[1], None), "");
    }
}
