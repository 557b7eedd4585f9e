// CSV summary of the working selection

use crate::db::InventoryRecord;
use crate::error::Result;
use crate::selection::SelectionTotals;
use chrono::NaiveDateTime;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const EXPORT_HEADERS: [&str; 6] = ["Barcode", "Quantity", "Height", "Width", "Meter Square", "Item"];

/// Timestamp prefix of exported file names
const FILE_TIMESTAMP_FORMAT: &str = "%d_%m_%Y_%H_%M_%S";

/// Shortest decimal that round-trips, with at least one fractional digit
///
/// Magnitudes from 1e-3 up to 1e7 print plainly (`3.0`, `2.5`); anything outside that
/// range switches to `1.2345678E7` notation.
pub fn format_area(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let plain = format!("{}", value);
        return if plain.contains('.') { plain } else { format!("{}.0", plain) };
    }

    let scientific = format!("{:e}", value);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{}E{}", mantissa, exponent),
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => scientific,
    }
}

/// Write header, one row per entry in selection order, then the totals row
pub fn write_selection_csv<W: Write>(mut out: W, records: &[InventoryRecord]) -> Result<SelectionTotals> {
    {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut out);

        wtr.write_record(EXPORT_HEADERS)?;

        for record in records {
            wtr.write_record([
                record.barcode.clone(),
                record.quantity.to_string(),
                record.height.to_string(),
                record.width.to_string(),
                format_area(record.area_square_meters),
                record.product_name.clone(),
            ])?;
        }

        wtr.flush()?;
    }

    let totals = SelectionTotals::of(records);
    writeln!(
        out,
        "Total, {},,, {},",
        totals.total_quantity,
        format_area(totals.total_area)
    )?;
    out.flush()?;

    Ok(totals)
}

pub fn selection_csv_bytes(records: &[InventoryRecord]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_selection_csv(&mut buffer, records)?;
    Ok(buffer)
}

/// `dd_MM_yyyy_HH_mm_ss N.csv`, N counting files that already share the timestamp
pub fn export_file_name(now: NaiveDateTime, existing: &[String]) -> String {
    let timestamp = now.format(FILE_TIMESTAMP_FORMAT).to_string();
    let count = existing.iter().filter(|name| name.starts_with(&timestamp)).count() + 1;
    numbered_file_name(&timestamp, count)
}

fn numbered_file_name(timestamp: &str, n: usize) -> String {
    format!("{} {}.csv", timestamp, n)
}

/// Write the selection into `dir` (created if absent) and return the file path
///
/// Never replaces an existing file: a taken name bumps N until a free one is created.
pub fn export_to_dir(dir: &Path, records: &[InventoryRecord], now: NaiveDateTime) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let existing: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();

    let timestamp = now.format(FILE_TIMESTAMP_FORMAT).to_string();
    let mut n = existing.iter().filter(|name| name.starts_with(&timestamp)).count() + 1;
    let (path, file) = loop {
        let path = dir.join(numbered_file_name(&timestamp, n));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break (path, file),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e.into()),
        }
    };
    let totals = write_selection_csv(std::io::BufWriter::new(file), records)?;

    info!(path = %path.display(), entries = totals.count, "selection exported");
    Ok(path)
}
