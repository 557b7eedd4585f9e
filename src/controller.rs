// Screen-level controller
// Owns exactly one dataset state and one selection; front ends observe both.

use crate::config::AppConfig;
use crate::dataset::DatasetState;
use crate::db::{InventoryRecord, RecordCache, SqliteCache};
use crate::drive::{AuthProvider, LocalAuth, LocalFolderDrive, RemoteDrive};
use crate::error::{Error, Result};
use crate::export::{export_to_dir, selection_csv_bytes};
use crate::observable::{Observable, Subscription};
use crate::parser::{BatchMovementParser, InventoryParser};
use crate::selection::{self, parse_quantity, Selection, SelectionTotals};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// ============================================================================
// INPUT MODES
// ============================================================================

/// How the code reached us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Typed by the operator
    Manual,
    /// Read by the camera; misses are never recorded
    Camera,
    /// Typed by the operator, recorded as a custom entry when unknown
    CustomInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Each scan is one record as ingested
    Slabs,
    /// Operator supplies the quantity for the scanned record
    Tiles,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum ScanOutcome {
    Matched(InventoryRecord),
    Custom(InventoryRecord),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Dataset published with this many records
    Loaded(usize),
    Failed(String),
    /// Another pass is running; this request was ignored
    AlreadyInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub local_path: PathBuf,
    pub remote_id: String,
}

/// Black-box services the controller calls into
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn AuthProvider>,
    pub drive: Arc<dyn RemoteDrive>,
    pub cache: Arc<dyn RecordCache>,
    pub parser: Arc<dyn InventoryParser>,
}

impl Collaborators {
    /// Filesystem-backed services described by the config
    pub fn local(config: &AppConfig) -> Result<Self> {
        Ok(Collaborators {
            auth: Arc::new(LocalAuth::new(config.operator.clone())),
            drive: Arc::new(LocalFolderDrive::new(config.drive_root.clone())),
            cache: Arc::new(SqliteCache::open(&config.database_path)?),
            parser: Arc::new(BatchMovementParser::with_layout(config.layout.clone())),
        })
    }
}

/// Clears the in-flight flag when a pass ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct InventoryController {
    config: AppConfig,
    services: Collaborators,
    dataset: Observable<DatasetState>,
    selection: Observable<Selection>,
    last_match: Observable<Option<InventoryRecord>>,
    refreshing: AtomicBool,
}

impl InventoryController {
    pub fn new(config: AppConfig, services: Collaborators) -> Self {
        InventoryController {
            config,
            services,
            dataset: Observable::new(DatasetState::Idle),
            selection: Observable::new(Selection::new()),
            last_match: Observable::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Controller over the local drive directory and SQLite cache
    pub fn local(config: AppConfig) -> Result<Self> {
        let services = Collaborators::local(&config)?;
        Ok(Self::new(config, services))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Observed state
    // ------------------------------------------------------------------------

    pub fn dataset(&self) -> Arc<DatasetState> {
        self.dataset.get()
    }

    pub fn selection(&self) -> Arc<Selection> {
        self.selection.get()
    }

    pub fn last_match(&self) -> Arc<Option<InventoryRecord>> {
        self.last_match.get()
    }

    pub fn subscribe_dataset(&self) -> Subscription<DatasetState> {
        self.dataset.subscribe()
    }

    pub fn subscribe_selection(&self) -> Subscription<Selection> {
        self.selection.subscribe()
    }

    pub fn subscribe_last_match(&self) -> Subscription<Option<InventoryRecord>> {
        self.last_match.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------------
    // Dataset lifecycle
    // ------------------------------------------------------------------------

    /// Startup load: cached snapshot if there is one, otherwise the drive
    pub fn load(&self) -> RefreshOutcome {
        let Some(_guard) = InFlight::acquire(&self.refreshing) else {
            return RefreshOutcome::AlreadyInFlight;
        };
        self.dataset.set(DatasetState::Loading);

        match self.services.cache.load_cached_records() {
            Ok(records) if !records.is_empty() => {
                info!(count = records.len(), "using cached batch snapshot");
                return self.publish(Ok(records));
            }
            Ok(_) => debug!("cache empty, fetching from drive"),
            Err(e) => warn!(error = %e, "cache unreadable, fetching from drive"),
        }

        self.publish(self.fetch_remote())
    }

    /// Explicit refresh from the drive; ignored while another pass runs
    pub fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = InFlight::acquire(&self.refreshing) else {
            info!("refresh already in flight, ignoring request");
            return RefreshOutcome::AlreadyInFlight;
        };
        self.dataset.set(DatasetState::Loading);
        self.publish(self.fetch_remote())
    }

    /// Ingest workbook bytes obtained out of band (e.g. a local file)
    pub fn ingest_bytes(&self, bytes: &[u8]) -> RefreshOutcome {
        let Some(_guard) = InFlight::acquire(&self.refreshing) else {
            return RefreshOutcome::AlreadyInFlight;
        };
        self.dataset.set(DatasetState::Loading);
        let result = self.parse_and_cache(bytes);
        self.publish(result)
    }

    /// Run `refresh` on a worker thread
    pub fn refresh_in_background(self: &Arc<Self>) -> std::thread::JoinHandle<RefreshOutcome> {
        let controller = Arc::clone(self);
        std::thread::spawn(move || controller.refresh())
    }

    fn fetch_remote(&self) -> Result<Vec<InventoryRecord>> {
        if !self.services.auth.is_signed_in() {
            let user = self.services.auth.sign_in()?;
            info!(user = %user.display_name, "signed in");
        }

        let folder_id = &self.config.folder_id;
        let file_name = &self.config.batch_file_name;

        let file = self
            .services
            .drive
            .find_file(folder_id, file_name)?
            .ok_or_else(|| Error::FileNotFound {
                folder_id: folder_id.clone(),
                name: file_name.clone(),
            })?;
        info!(name = %file.name, id = %file.id, "batch file found");

        let bytes = self.services.drive.download(&file.id)?;
        self.parse_and_cache(&bytes)
    }

    fn parse_and_cache(&self, bytes: &[u8]) -> Result<Vec<InventoryRecord>> {
        let report = self.services.parser.parse(bytes)?;

        // The snapshot is only a cache; failing to store it does not fail the pass
        if let Err(e) = self.services.cache.replace_cached_records(&report.records) {
            warn!(error = %e, "failed to replace cached snapshot");
        }

        Ok(report.records)
    }

    fn publish(&self, result: Result<Vec<InventoryRecord>>) -> RefreshOutcome {
        match result {
            Ok(records) => {
                let count = records.len();
                self.dataset.set(DatasetState::success(records));
                info!(count, "batch dataset ready");
                RefreshOutcome::Loaded(count)
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "failed to load batch dataset");
                self.dataset.set(DatasetState::Error(message.clone()));
                RefreshOutcome::Failed(message)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Case-insensitive exact barcode match against the live dataset
    pub fn lookup(&self, code: &str) -> Option<InventoryRecord> {
        let records = self.dataset.get().records();
        selection::lookup(&records, code).cloned()
    }

    /// Look the code up and append whatever the mode and item kind call for
    pub fn scan(&self, code: &str, mode: ScanMode, kind: ItemKind, quantity_text: &str) -> Result<ScanOutcome> {
        let found = self.lookup(code);
        self.last_match.set(found.clone());

        match found {
            Some(record) => {
                let override_quantity = match kind {
                    ItemKind::Tiles => Some(parse_quantity(quantity_text)?),
                    ItemKind::Slabs => None,
                };
                debug!(barcode = %record.barcode, product = %record.product_name, "found batch");
                Ok(ScanOutcome::Matched(self.append_match(record, override_quantity)))
            }
            None if mode == ScanMode::CustomInput => {
                Ok(ScanOutcome::Custom(self.append_custom(code, quantity_text)?))
            }
            None => {
                warn!(code = %code.trim(), "no match found for batch code");
                Ok(ScanOutcome::NotFound)
            }
        }
    }

    /// Append a matched record, optionally with the operator's quantity
    pub fn append_match(&self, record: InventoryRecord, override_quantity: Option<i64>) -> InventoryRecord {
        let entry = match override_quantity {
            Some(quantity) => record.with_quantity(quantity),
            None => record,
        };
        self.push(entry.clone());
        entry
    }

    /// Append a synthesized entry for an unknown code
    ///
    /// Quantity text that is not a whole number is rejected and nothing is appended.
    pub fn append_custom(&self, code: &str, quantity_text: &str) -> Result<InventoryRecord> {
        let quantity = parse_quantity(quantity_text)?;
        let entry = InventoryRecord::custom(code.trim(), quantity);
        self.push(entry.clone());
        Ok(entry)
    }

    fn push(&self, entry: InventoryRecord) {
        if let Some(next) = self.selection.update(|current| Some(current.appended(entry))) {
            debug!(size = next.len(), "item added");
        }
    }

    /// Remove the entry at `index`; out-of-range indices are ignored
    pub fn remove_at(&self, index: usize) -> bool {
        match self.selection.update(|current| current.removed(index)) {
            Some(next) => {
                debug!(index, size = next.len(), "item removed");
                true
            }
            None => {
                warn!(index, "invalid selection index, nothing removed");
                false
            }
        }
    }

    pub fn clear_selection(&self) {
        self.selection.set(Selection::new());
    }

    pub fn clear_last_match(&self) {
        self.last_match.set(None);
    }

    pub fn totals(&self) -> SelectionTotals {
        self.selection.get().totals()
    }

    // ------------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------------

    pub fn export_csv(&self) -> Result<Vec<u8>> {
        selection_csv_bytes(self.selection.get().entries())
    }

    /// Write the selection to the export directory, then upload it to the drive
    pub fn export_and_upload(&self) -> Result<UploadReceipt> {
        if !self.services.auth.is_signed_in() {
            return Err(Error::NotSignedIn);
        }

        let selection = self.selection.get();
        let now = chrono::Local::now().naive_local();
        let local_path = export_to_dir(&self.config.export_dir, selection.entries(), now)?;

        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(&local_path)?;

        let remote_id = self
            .services
            .drive
            .upload(&bytes, &file_name, &self.config.upload_folder)
            .map_err(|e| {
                error!(error = %e, "drive upload failed");
                e
            })?;

        info!(remote_id = %remote_id, "drive upload complete");
        Ok(UploadReceipt { local_path, remote_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::{RemoteFile, UserHandle};
    use crate::parser::ParseReport;
    use std::collections::HashMap;
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    // ------------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------------

    struct FakeAuth {
        signed_in: bool,
    }

    impl AuthProvider for FakeAuth {
        fn is_signed_in(&self) -> bool {
            self.signed_in
        }

        fn sign_in(&self) -> Result<UserHandle> {
            if self.signed_in {
                Ok(UserHandle {
                    user_id: "u1".into(),
                    display_name: "Tester".into(),
                })
            } else {
                Err(Error::NotSignedIn)
            }
        }
    }

    #[derive(Default)]
    struct MemoryDrive {
        files: Mutex<HashMap<String, Vec<u8>>>,
        uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl MemoryDrive {
        fn with_file(folder: &str, name: &str, bytes: &[u8]) -> Self {
            let drive = MemoryDrive::default();
            drive
                .files
                .lock()
                .unwrap()
                .insert(format!("{}/{}", folder, name), bytes.to_vec());
            drive
        }
    }

    impl RemoteDrive for MemoryDrive {
        fn list_files(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
            let prefix = format!("{}/", folder_id);
            Ok(self
                .files
                .lock()
                .unwrap()
                .keys()
                .filter_map(|id| {
                    id.strip_prefix(&prefix).map(|name| RemoteFile {
                        id: id.clone(),
                        name: name.to_string(),
                        mime_type: "application/vnd.ms-excel".into(),
                    })
                })
                .collect())
        }

        fn download(&self, file_id: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(file_id)
                .cloned()
                .ok_or_else(|| Error::Transport(format!("no such file {}", file_id)))
        }

        fn upload(&self, bytes: &[u8], file_name: &str, folder_name: &str) -> Result<String> {
            self.uploads
                .lock()
                .unwrap()
                .push((folder_name.to_string(), file_name.to_string(), bytes.to_vec()));
            Ok(format!("{}/{}", folder_name, file_name))
        }
    }

    /// Returns fixed records; the bytes must equal b"batch"
    struct FixedParser {
        records: Vec<InventoryRecord>,
    }

    impl InventoryParser for FixedParser {
        fn parse(&self, bytes: &[u8]) -> Result<ParseReport> {
            if bytes != b"batch" {
                return Err(Error::Workbook("not a workbook".into()));
            }
            Ok(ParseReport {
                records: self.records.clone(),
                ..ParseReport::default()
            })
        }
    }

    /// Blocks until the test opens the gate
    struct GatedParser {
        gate: Mutex<mpsc::Receiver<()>>,
        records: Vec<InventoryRecord>,
    }

    impl InventoryParser for GatedParser {
        fn parse(&self, _bytes: &[u8]) -> Result<ParseReport> {
            let _ = self.gate.lock().unwrap().recv();
            Ok(ParseReport {
                records: self.records.clone(),
                ..ParseReport::default()
            })
        }
    }

    fn granite_batch() -> Vec<InventoryRecord> {
        vec![
            InventoryRecord::new("Granite A", "SF100", 90, 300, 1, 2.5),
            InventoryRecord::new("Granite A", "SF101", 90, 300, 2, 1.5),
        ]
    }

    fn test_config() -> AppConfig {
        AppConfig {
            folder_id: "batches".into(),
            batch_file_name: "Batch Movement  .xls".into(),
            ..AppConfig::default()
        }
    }

    fn controller_with(drive: MemoryDrive, signed_in: bool, parser: Arc<dyn InventoryParser>) -> (InventoryController, Arc<SqliteCache>, Arc<MemoryDrive>) {
        let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
        let drive = Arc::new(drive);
        let services = Collaborators {
            auth: Arc::new(FakeAuth { signed_in }),
            drive: drive.clone(),
            cache: cache.clone(),
            parser,
        };
        (InventoryController::new(test_config(), services), cache, drive)
    }

    fn ready_controller() -> InventoryController {
        let (controller, _, _) = controller_with(
            MemoryDrive::with_file("batches", "batch movement .xls", b"batch"),
            true,
            Arc::new(FixedParser { records: granite_batch() }),
        );
        assert_eq!(controller.refresh(), RefreshOutcome::Loaded(2));
        controller
    }

    // ------------------------------------------------------------------------
    // Dataset lifecycle
    // ------------------------------------------------------------------------

    #[test]
    fn test_refresh_publishes_loading_then_success() {
        let (controller, cache, _) = controller_with(
            MemoryDrive::with_file("batches", "Batch Movement .xls", b"batch"),
            true,
            Arc::new(FixedParser { records: granite_batch() }),
        );
        let mut rx = controller.subscribe_dataset();

        assert_eq!(*controller.dataset(), DatasetState::Idle);
        assert_eq!(controller.refresh(), RefreshOutcome::Loaded(2));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().label(), "Ready");
        assert_eq!(*controller.dataset().records(), granite_batch());
        assert_eq!(cache.load_cached_records().unwrap(), granite_batch());
    }

    #[test]
    fn test_load_prefers_cache() {
        // Drive is empty: success proves the cache was used
        let (controller, cache, _) = controller_with(
            MemoryDrive::default(),
            true,
            Arc::new(FixedParser { records: vec![] }),
        );
        cache.replace_cached_records(&granite_batch()).unwrap();

        assert_eq!(controller.load(), RefreshOutcome::Loaded(2));
        assert_eq!(*controller.dataset().records(), granite_batch());
    }

    #[test]
    fn test_load_with_empty_cache_goes_remote() {
        let (controller, _, _) = controller_with(
            MemoryDrive::with_file("batches", "Batch Movement  .xls", b"batch"),
            true,
            Arc::new(FixedParser { records: granite_batch() }),
        );

        assert_eq!(controller.load(), RefreshOutcome::Loaded(2));
    }

    #[test]
    fn test_missing_file_is_error_state() {
        let (controller, _, _) = controller_with(
            MemoryDrive::with_file("batches", "other.xls", b"batch"),
            true,
            Arc::new(FixedParser { records: granite_batch() }),
        );

        match controller.refresh() {
            RefreshOutcome::Failed(message) => assert!(message.contains("not found")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(matches!(*controller.dataset(), DatasetState::Error(_)));
    }

    #[test]
    fn test_signed_out_is_error_state() {
        let (controller, _, _) = controller_with(
            MemoryDrive::with_file("batches", "Batch Movement  .xls", b"batch"),
            false,
            Arc::new(FixedParser { records: granite_batch() }),
        );

        assert!(matches!(controller.refresh(), RefreshOutcome::Failed(_)));
        assert!(matches!(*controller.dataset(), DatasetState::Error(_)));
    }

    #[test]
    fn test_failed_refresh_recovers_on_retry() {
        let (controller, _, drive) = controller_with(
            MemoryDrive::with_file("batches", "Batch Movement  .xls", b"corrupt"),
            true,
            Arc::new(FixedParser { records: granite_batch() }),
        );

        assert!(matches!(controller.refresh(), RefreshOutcome::Failed(_)));

        drive
            .files
            .lock()
            .unwrap()
            .insert("batches/Batch Movement  .xls".into(), b"batch".to_vec());

        assert_eq!(controller.refresh(), RefreshOutcome::Loaded(2));
    }

    #[test]
    fn test_ingest_bytes_replaces_dataset() {
        let controller = ready_controller();
        let (other, _, _) = controller_with(
            MemoryDrive::default(),
            true,
            Arc::new(FixedParser { records: vec![granite_batch()[0].clone()] }),
        );

        assert_eq!(other.ingest_bytes(b"batch"), RefreshOutcome::Loaded(1));
        assert!(matches!(other.ingest_bytes(b"junk"), RefreshOutcome::Failed(_)));
        assert!(matches!(*other.dataset(), DatasetState::Error(_)));

        // untouched
        assert_eq!(controller.dataset().records().len(), 2);
    }

    #[test]
    fn test_concurrent_refresh_is_ignored() {
        let (open_gate, gate) = mpsc::channel();
        let (controller, _, _) = controller_with(
            MemoryDrive::with_file("batches", "Batch Movement  .xls", b"batch"),
            true,
            Arc::new(GatedParser {
                gate: Mutex::new(gate),
                records: granite_batch(),
            }),
        );
        let controller = Arc::new(controller);

        let handle = controller.refresh_in_background();
        for _ in 0..500 {
            if controller.is_refreshing() {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(controller.is_refreshing());
        assert!(controller.dataset().is_loading());

        assert_eq!(controller.refresh(), RefreshOutcome::AlreadyInFlight);
        assert_eq!(controller.load(), RefreshOutcome::AlreadyInFlight);

        open_gate.send(()).unwrap();
        assert_eq!(handle.join().unwrap(), RefreshOutcome::Loaded(2));
        assert!(!controller.is_refreshing());
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    #[test]
    fn test_lookup_against_idle_dataset_is_none() {
        let (controller, _, _) = controller_with(
            MemoryDrive::default(),
            true,
            Arc::new(FixedParser { records: vec![] }),
        );

        assert!(controller.lookup("SF100").is_none());
    }

    #[test]
    fn test_scan_slabs_appends_record_as_is() {
        let controller = ready_controller();

        let outcome = controller.scan("sf100 ", ScanMode::Manual, ItemKind::Slabs, "").unwrap();

        assert_eq!(outcome, ScanOutcome::Matched(granite_batch()[0].clone()));
        assert_eq!(controller.selection().entries(), &granite_batch()[..1]);
        assert_eq!(*controller.last_match(), Some(granite_batch()[0].clone()));
    }

    #[test]
    fn test_scan_tiles_overrides_quantity() {
        let controller = ready_controller();

        controller.scan("SF101", ScanMode::Camera, ItemKind::Tiles, "12").unwrap();

        let selection = controller.selection();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.entries()[0].quantity, 12);
        assert_eq!(selection.entries()[0].area_square_meters, 1.5);
    }

    #[test]
    fn test_scan_tiles_with_bad_quantity_appends_nothing() {
        let controller = ready_controller();

        let result = controller.scan("SF101", ScanMode::Manual, ItemKind::Tiles, "a dozen");

        assert!(matches!(result, Err(Error::InvalidQuantity(_))));
        assert!(controller.selection().is_empty());
    }

    #[test]
    fn test_scan_miss_with_custom_input_synthesizes_entry() {
        let controller = ready_controller();

        assert!(controller.lookup("SF999").is_none());
        let outcome = controller.scan("SF999", ScanMode::CustomInput, ItemKind::Slabs, "4").unwrap();

        let expected = InventoryRecord::new("Custom Input", "SF999", 0, 0, 4, 0.0);
        assert_eq!(outcome, ScanOutcome::Custom(expected.clone()));
        assert_eq!(controller.selection().entries(), &[expected]);
        assert_eq!(*controller.last_match(), None);
    }

    #[test]
    fn test_custom_entry_with_bad_quantity_appends_nothing() {
        let controller = ready_controller();
        let rx = controller.subscribe_selection();

        let direct = controller.append_custom("SF999", "4x");
        let scanned = controller.scan("SF999", ScanMode::CustomInput, ItemKind::Slabs, "lots");
        let too_big = controller.append_custom("SF999", "9223372036854775807");

        assert!(matches!(direct, Err(Error::InvalidQuantity(ref text)) if text == "4x"));
        assert!(matches!(scanned, Err(Error::InvalidQuantity(ref text)) if text == "lots"));
        assert!(matches!(too_big, Err(Error::InvalidQuantity(_))));
        assert!(controller.selection().is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_scan_miss_without_custom_input_is_ignored() {
        let controller = ready_controller();

        assert_eq!(
            controller.scan("SF999", ScanMode::Manual, ItemKind::Slabs, "4").unwrap(),
            ScanOutcome::NotFound
        );
        assert_eq!(
            controller.scan("SF999", ScanMode::Camera, ItemKind::Tiles, "4").unwrap(),
            ScanOutcome::NotFound
        );
        assert!(controller.selection().is_empty());
    }

    #[test]
    fn test_remove_at_and_totals() {
        let controller = ready_controller();
        let mut rx = controller.subscribe_selection();

        controller.append_match(granite_batch()[0].clone(), None);
        controller.append_match(granite_batch()[1].clone(), None);
        controller.append_match(granite_batch()[0].clone(), Some(5));

        let totals = controller.totals();
        assert_eq!(totals.count, 3);
        assert_eq!(totals.total_quantity, 1 + 2 + 5);
        assert_eq!(totals.display_area(), "6.50");

        assert_eq!(rx.borrow_and_update().len(), 3);

        let before = controller.selection();
        assert!(!controller.remove_at(3));
        assert_eq!(*controller.selection(), *before);
        assert!(!rx.has_changed().unwrap());

        assert!(controller.remove_at(1));
        let barcodes: Vec<String> = controller
            .selection()
            .entries()
            .iter()
            .map(|r| r.barcode.clone())
            .collect();
        assert_eq!(barcodes, vec!["SF100", "SF100"]);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_clear_selection_and_last_match() {
        let controller = ready_controller();
        controller.scan("SF100", ScanMode::Manual, ItemKind::Slabs, "").unwrap();

        controller.clear_last_match();
        controller.clear_selection();

        assert!(controller.selection().is_empty());
        assert_eq!(*controller.last_match(), None);
    }

    // ------------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------------

    #[test]
    fn test_export_csv_reflects_selection() {
        let controller = ready_controller();
        controller.scan("SF100", ScanMode::Manual, ItemKind::Slabs, "").unwrap();
        controller.scan("SF101", ScanMode::Manual, ItemKind::Slabs, "").unwrap();

        let text = String::from_utf8(controller.export_csv().unwrap()).unwrap();

        assert!(text.starts_with("Barcode,Quantity,Height,Width,Meter Square,Item\n"));
        assert!(text.contains("SF100,1,90,300,2.5,Granite A\n"));
        assert!(text.ends_with("Total, 3,,, 4.0,\n"));
    }

    #[test]
    fn test_export_and_upload() {
        let export_dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
        let drive = Arc::new(MemoryDrive::with_file("batches", "Batch Movement  .xls", b"batch"));
        let config = AppConfig {
            export_dir: export_dir.path().join("StonesForever"),
            ..test_config()
        };
        let controller = InventoryController::new(
            config,
            Collaborators {
                auth: Arc::new(FakeAuth { signed_in: true }),
                drive: drive.clone(),
                cache,
                parser: Arc::new(FixedParser { records: granite_batch() }),
            },
        );
        controller.refresh();
        controller.scan("SF100", ScanMode::Manual, ItemKind::Slabs, "").unwrap();

        let receipt = controller.export_and_upload().unwrap();

        assert!(receipt.local_path.exists());
        assert!(receipt.remote_id.starts_with("StonesForever/"));
        let uploads = drive.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].2, std::fs::read(&receipt.local_path).unwrap());
    }

    #[test]
    fn test_export_and_upload_requires_sign_in() {
        let (controller, _, drive) = controller_with(
            MemoryDrive::default(),
            false,
            Arc::new(FixedParser { records: vec![] }),
        );

        assert!(matches!(controller.export_and_upload(), Err(Error::NotSignedIn)));
        assert!(drive.uploads.lock().unwrap().is_empty());
    }
}
