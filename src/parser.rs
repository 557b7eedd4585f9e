// Spreadsheet ingestion for the "Batch Movement" workbook
// Rows are classified one by one and folded into records; only an unreadable workbook fails a pass

use crate::db::InventoryRecord;
use crate::error::{Error, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Section header marker in column 0, compared case-insensitively
pub const PRODUCT_HEADER_PREFIX: &str = "product name:";

/// Status value in column 1 that marks a verified data row
pub const CHECKED_MARKER: &str = "checked";

// ============================================================================
// TYPED CELL ACCESS
// ============================================================================

/// One cell as read from the sheet
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Absent,
}

static ABSENT: CellValue = CellValue::Absent;

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// Trimmed string rendering; whole numbers render without a fraction
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Absent => String::new(),
        }
    }

    pub fn as_number(&self) -> NumericCell {
        match self {
            CellValue::Number(n) => NumericCell::Present(*n),
            CellValue::Absent => NumericCell::Absent,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    NumericCell::Absent
                } else {
                    match trimmed.parse::<f64>() {
                        Ok(n) if n.is_finite() => NumericCell::Present(n),
                        _ => NumericCell::WrongType(trimmed.to_string()),
                    }
                }
            }
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Absent,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// Result of reading a cell as a number
#[derive(Debug, Clone, PartialEq)]
pub enum NumericCell {
    Present(f64),
    Absent,
    /// Cell holds text that is not a number
    WrongType(String),
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A sheet row with its absolute row index
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub index: usize,
    pub cells: Vec<CellValue>,
}

impl SheetRow {
    pub fn new(index: usize, cells: Vec<CellValue>) -> Self {
        SheetRow { index, cells }
    }

    pub fn cell(&self, column: usize) -> &CellValue {
        self.cells.get(column).unwrap_or(&ABSENT)
    }

    pub fn text(&self, column: usize) -> String {
        self.cell(column).as_text()
    }

    pub fn number(&self, column: usize) -> NumericCell {
        self.cell(column).as_number()
    }

    /// Number of columns up to and including the last populated cell
    pub fn width(&self) -> usize {
        self.cells
            .iter()
            .rposition(|c| *c != CellValue::Absent)
            .map_or(0, |last| last + 1)
    }
}

// ============================================================================
// COLUMN LAYOUT
// ============================================================================

/// Fixed column positions of the batch movement sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    /// Rows skipped before data begins
    pub header_rows: usize,
    pub product_column: usize,
    pub status_column: usize,
    pub barcode_column: usize,
    pub area_column: usize,
    pub quantity_column: usize,
    pub height_column: usize,
    pub width_column: usize,
    /// Candidate rows narrower than this are skipped
    pub min_columns: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        ColumnLayout {
            header_rows: 2,
            product_column: 0,
            status_column: 1,
            barcode_column: 3,
            area_column: 6,
            quantity_column: 9,
            height_column: 11,
            width_column: 12,
            min_columns: 14,
        }
    }
}

// ============================================================================
// ROW CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Status column is not "checked"
    Unmarked,
    MissingBarcode,
    TooFewColumns { found: usize, required: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Section header carrying the product name for the rows below it
    Header(String),
    Data(InventoryRecord),
    Skip(SkipReason),
}

/// Classify one row given the product name currently in effect
pub fn classify_row(row: &SheetRow, layout: &ColumnLayout, current_product: &str) -> RowOutcome {
    let marker = row.text(layout.product_column);
    if let Some(name) = product_header(&marker) {
        return RowOutcome::Header(name);
    }

    let status = row.text(layout.status_column).to_lowercase();
    if status != CHECKED_MARKER {
        return RowOutcome::Skip(SkipReason::Unmarked);
    }

    let barcode = row.text(layout.barcode_column);
    if barcode.is_empty() {
        return RowOutcome::Skip(SkipReason::MissingBarcode);
    }

    let found = row.width();
    if found < layout.min_columns {
        return RowOutcome::Skip(SkipReason::TooFewColumns {
            found,
            required: layout.min_columns,
        });
    }

    RowOutcome::Data(InventoryRecord {
        product_name: current_product.to_string(),
        area_square_meters: number_or_zero(row, layout.area_column, "area"),
        quantity: whole_or_zero(row, layout.quantity_column, "quantity"),
        height: whole_or_zero(row, layout.height_column, "height"),
        width: whole_or_zero(row, layout.width_column, "width"),
        barcode,
    })
}

/// Integer columns truncate toward zero and saturate at the 32-bit range
fn whole_or_zero(row: &SheetRow, column: usize, field: &str) -> i64 {
    number_or_zero(row, column, field) as i32 as i64
}

fn product_header(marker: &str) -> Option<String> {
    let prefix_len = PRODUCT_HEADER_PREFIX.len();
    marker
        .get(..prefix_len)
        .filter(|head| head.eq_ignore_ascii_case(PRODUCT_HEADER_PREFIX))
        .map(|_| marker[prefix_len..].trim().to_string())
}

fn number_or_zero(row: &SheetRow, column: usize, field: &str) -> f64 {
    match row.number(column) {
        NumericCell::Present(n) => n,
        NumericCell::Absent => 0.0,
        NumericCell::WrongType(raw) => {
            warn!(row = row.index, column, field, raw = %raw, "non-numeric cell, using 0");
            0.0
        }
    }
}

// ============================================================================
// FOLD
// ============================================================================

/// Outcome of one ingestion pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    pub records: Vec<InventoryRecord>,
    /// (row index, reason) for every skipped candidate or non-data row
    pub skipped: Vec<(usize, SkipReason)>,
    pub rows_scanned: usize,
}

/// Fold rows into records, carrying the current product name across rows
pub fn parse_rows<'a, I>(rows: I, layout: &ColumnLayout) -> ParseReport
where
    I: IntoIterator<Item = &'a SheetRow>,
{
    let mut report = ParseReport::default();
    let mut current_product = String::new();

    for row in rows.into_iter().filter(|r| r.index >= layout.header_rows) {
        report.rows_scanned += 1;

        match classify_row(row, layout, &current_product) {
            RowOutcome::Header(name) => {
                debug!(row = row.index, product = %name, "found product section");
                current_product = name;
            }
            RowOutcome::Data(record) => {
                debug!(row = row.index, barcode = %record.barcode, "row parsed");
                report.records.push(record);
            }
            RowOutcome::Skip(reason) => {
                if let SkipReason::TooFewColumns { found, required } = reason {
                    warn!(row = row.index, found, required, "row has too few columns, skipping");
                }
                report.skipped.push((row.index, reason));
            }
        }
    }

    report
}

// ============================================================================
// WORKBOOK DECODING
// ============================================================================

/// Decode the first worksheet into rows with absolute indices
pub fn decode_workbook(bytes: &[u8]) -> Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::Workbook(e.to_string()))?;

    let sheet_name = workbook.sheet_names().first().cloned().unwrap_or_default();

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(Error::NoWorksheet)?
        .map_err(|e| Error::Workbook(e.to_string()))?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    let rows: Vec<SheetRow> = range
        .rows()
        .enumerate()
        .map(|(offset, cells)| {
            let mut values = vec![CellValue::Absent; start_col as usize];
            values.extend(cells.iter().map(CellValue::from));
            SheetRow::new(start_row as usize + offset, values)
        })
        .collect();

    info!(sheet = %sheet_name, rows = rows.len(), "worksheet loaded");
    Ok(rows)
}

// ============================================================================
// PARSER
// ============================================================================

/// Anything that can turn workbook bytes into inventory records
pub trait InventoryParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<ParseReport>;

    /// Parser version (for diagnostics)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

/// Parser for the batch movement sheet layout
#[derive(Debug, Clone, Default)]
pub struct BatchMovementParser {
    layout: ColumnLayout,
}

impl BatchMovementParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: ColumnLayout) -> Self {
        BatchMovementParser { layout }
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn parse_path(&self, path: &Path) -> Result<ParseReport> {
        let bytes = std::fs::read(path)?;
        self.parse(&bytes)
    }
}

impl InventoryParser for BatchMovementParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParseReport> {
        let rows = decode_workbook(bytes)?;
        let report = parse_rows(&rows, &self.layout);

        info!(
            records = report.records.len(),
            skipped = report.skipped.len(),
            rows_scanned = report.rows_scanned,
            "parsing complete"
        );
        Ok(report)
    }
}
