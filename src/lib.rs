// Stones Inventory - Core Library
// Exposes all modules for use in CLI, TUI, API server, and tests

pub mod error;
pub mod db;
pub mod parser;
pub mod observable;
pub mod dataset;
pub mod selection;
pub mod export;
pub mod drive;
pub mod config;
pub mod controller;
pub mod logging;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use error::{Error, Result};
pub use db::{
    InventoryRecord, RecordCache, SqliteCache, CUSTOM_PRODUCT_NAME,
    setup_database, load_cached_records, replace_cached_records, verify_count,
};
pub use parser::{
    BatchMovementParser, ColumnLayout, InventoryParser, ParseReport, SkipReason,
    decode_workbook, parse_rows,
};
pub use observable::{Observable, Subscription};
pub use dataset::DatasetState;
pub use selection::{Selection, SelectionTotals, lookup, parse_quantity};
pub use export::{
    EXPORT_HEADERS, export_file_name, export_to_dir, selection_csv_bytes, write_selection_csv,
};
pub use drive::{
    AuthProvider, LocalAuth, LocalFolderDrive, RemoteDrive, RemoteFile, UserHandle,
};
pub use config::AppConfig;
pub use controller::{
    Collaborators, InventoryController, ItemKind, RefreshOutcome, ScanMode, ScanOutcome,
    UploadReceipt,
};
