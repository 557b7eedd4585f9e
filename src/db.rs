use crate::error::Result;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Product name given to records typed in by the operator with no batch match
pub const CUSTOM_PRODUCT_NAME: &str = "Custom Input";

/// One physical unit or lot of stone/tile stock
/// Barcode is the natural key within a loaded batch; it is empty only for custom entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_name: String,
    pub barcode: String,
    pub height: i64,
    pub width: i64,
    pub quantity: i64,
    pub area_square_meters: f64,
}

impl InventoryRecord {
    pub fn new(
        product_name: impl Into<String>,
        barcode: impl Into<String>,
        height: i64,
        width: i64,
        quantity: i64,
        area_square_meters: f64,
    ) -> Self {
        InventoryRecord {
            product_name: product_name.into(),
            barcode: barcode.into(),
            height,
            width,
            quantity,
            area_square_meters,
        }
    }

    /// Synthesized entry for a code the batch does not know about
    pub fn custom(barcode: impl Into<String>, quantity: i64) -> Self {
        InventoryRecord::new(CUSTOM_PRODUCT_NAME, barcode, 0, 0, quantity, 0.0)
    }

    /// Copy of this record carrying a different quantity
    pub fn with_quantity(&self, quantity: i64) -> Self {
        InventoryRecord {
            quantity,
            ..self.clone()
        }
    }

    /// Case-insensitive exact match on the whole trimmed code
    pub fn matches_code(&self, code: &str) -> bool {
        self.barcode.to_lowercase() == code.trim().to_lowercase()
    }
}

/// Local snapshot of the last successfully ingested batch
///
/// The cache is not a ledger: every successful refresh overwrites it entirely.
pub trait RecordCache: Send + Sync {
    /// Records of the last snapshot in ingestion order (empty if none)
    fn load_cached_records(&self) -> Result<Vec<InventoryRecord>>;

    /// Full overwrite with a new snapshot
    fn replace_cached_records(&self, records: &[InventoryRecord]) -> Result<()>;
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // One row per barcode; position keeps the ingestion order across reloads
    conn.execute(
        "CREATE TABLE IF NOT EXISTS batch_movements (
            barcode TEXT PRIMARY KEY NOT NULL,
            position INTEGER NOT NULL,
            product_name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            meter_square REAL NOT NULL,
            height INTEGER NOT NULL,
            width INTEGER NOT NULL,
            cached_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_batch_position ON batch_movements(position)",
        [],
    )?;

    Ok(())
}

pub fn load_cached_records(conn: &Connection) -> Result<Vec<InventoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT product_name, barcode, height, width, quantity, meter_square
         FROM batch_movements
         ORDER BY position ASC",
    )?;

    let records = stmt
        .query_map([], |row| {
            Ok(InventoryRecord {
                product_name: row.get(0)?,
                barcode: row.get(1)?,
                height: row.get(2)?,
                width: row.get(3)?,
                quantity: row.get(4)?,
                area_square_meters: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(count = records.len(), "loaded cached batch movements");
    Ok(records)
}

/// Replace the whole snapshot in one transaction
///
/// Rows sharing a barcode collapse to the last one written.
pub fn replace_cached_records(conn: &mut Connection, records: &[InventoryRecord]) -> Result<usize> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM batch_movements", [])?;

    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO batch_movements (
                barcode, position, product_name, quantity, meter_square, height, width
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for (position, record) in records.iter().enumerate() {
            stmt.execute(params![
                record.barcode,
                position as i64,
                record.product_name,
                record.quantity,
                record.area_square_meters,
                record.height,
                record.width,
            ])?;
        }
    }

    tx.commit()?;

    let stored = verify_count(conn)? as usize;
    info!(written = records.len(), stored, "replaced cached batch snapshot");
    Ok(stored)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM batch_movements", [], |row| row.get(0))?;

    Ok(count)
}

/// SQLite-backed `RecordCache`
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteCache {
            conn: Mutex::new(conn),
        })
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        verify_count(&conn)
    }
}

impl RecordCache for SqliteCache {
    fn load_cached_records(&self) -> Result<Vec<InventoryRecord>> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        load_cached_records(&conn)
    }

    fn replace_cached_records(&self, records: &[InventoryRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        replace_cached_records(&mut conn, records)?;
        Ok(())
    }
}
