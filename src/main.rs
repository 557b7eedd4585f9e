// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;

// Use library instead of local modules
use stones_inventory::{logging, AppConfig, InventoryController, RefreshOutcome};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = AppConfig::load()?;

    match args.get(1).map(String::as_str) {
        Some("import") => {
            logging::init();
            let path = args.get(2).context("usage: stones-inventory import <workbook>")?;
            run_import(config, Path::new(path))?;
        }
        Some("refresh") => {
            logging::init();
            run_refresh(config)?;
        }
        Some("lookup") => {
            logging::init();
            let code = args.get(2).context("usage: stones-inventory lookup <code>")?;
            run_lookup(config, code)?;
        }
        Some("export") => {
            logging::init();
            run_export(config, &args[2..])?;
        }
        Some(other) if other != "ui" => bail!("unknown command '{}' (expected import, refresh, lookup, export, ui)", other),
        // UI mode (default)
        _ => run_ui_mode(config)?,
    }

    Ok(())
}

fn run_import(config: AppConfig, path: &Path) -> Result<()> {
    println!("🗄️  Batch Import - Workbook → SQLite cache");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Reading workbook {}...", path.display());
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read workbook: {:?}", path))?;
    println!("✓ Read {} bytes", bytes.len());

    let controller = InventoryController::local(config)?;

    println!("\n💾 Parsing and caching records...");
    report(controller.ingest_bytes(&bytes))
}

fn run_refresh(config: AppConfig) -> Result<()> {
    println!("🔄 Refreshing batch data from {}", config.drive_root.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let controller = InventoryController::local(config)?;
    report(controller.refresh())
}

fn report(outcome: RefreshOutcome) -> Result<()> {
    match outcome {
        RefreshOutcome::Loaded(count) => {
            println!("✓ Dataset ready with {} records", count);
            Ok(())
        }
        RefreshOutcome::Failed(message) => {
            eprintln!("❌ {}", message);
            std::process::exit(1);
        }
        RefreshOutcome::AlreadyInFlight => {
            println!("⏳ A refresh is already running");
            Ok(())
        }
    }
}

fn run_lookup(config: AppConfig, code: &str) -> Result<()> {
    let controller = InventoryController::local(config)?;
    if let RefreshOutcome::Failed(message) = controller.load() {
        eprintln!("❌ {}", message);
        std::process::exit(1);
    }

    match controller.lookup(code) {
        Some(record) => {
            println!("🔍 {}", record.barcode);
            println!("   Item:         {}", record.product_name);
            println!("   Quantity:     {}", record.quantity);
            println!("   Height:       {}", record.height);
            println!("   Width:        {}", record.width);
            println!("   Meter Square: {}", record.area_square_meters);
        }
        None => {
            println!("❌ No match found for '{}'", code.trim());
        }
    }

    Ok(())
}

/// `export [CODE[:QTY] ...]`: builds a selection from the codes, writes and uploads the CSV summary
fn run_export(config: AppConfig, codes: &[String]) -> Result<()> {
    let controller = InventoryController::local(config)?;
    if let RefreshOutcome::Failed(message) = controller.load() {
        eprintln!("❌ {}", message);
        std::process::exit(1);
    }

    for arg in codes {
        let (code, quantity) = match arg.split_once(':') {
            Some((code, qty)) => (code, Some(qty)),
            None => (arg.as_str(), None),
        };

        match (controller.lookup(code), quantity) {
            (Some(record), Some(qty)) => {
                let qty = stones_inventory::parse_quantity(qty)?;
                controller.append_match(record, Some(qty));
            }
            (Some(record), None) => {
                controller.append_match(record, None);
            }
            (None, Some(qty)) => {
                controller.append_custom(code, qty)?;
                println!("➕ {} added as custom entry", code.trim());
            }
            (None, None) => println!("⚠️  Skipping unknown code '{}'", code.trim()),
        }
    }

    let totals = controller.totals();
    println!("\n📊 {} entries, quantity {}, area {}", totals.count, totals.total_quantity, totals.display_area());

    let receipt = controller.export_and_upload()?;
    println!("✓ Written to {}", receipt.local_path.display());
    println!("✓ Uploaded as {}", receipt.remote_id);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: AppConfig) -> Result<()> {
    use std::sync::Arc;
    use stones_inventory::DatasetState;

    println!("🖥️  Loading Stones Inventory scanner...\n");

    let log_path = config.export_dir.join("stones-inventory.log");
    logging::init_to_file(&log_path)
        .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

    let controller = Arc::new(InventoryController::local(config)?);

    println!("📊 Loading batch data...");
    match controller.load() {
        RefreshOutcome::Loaded(count) => println!("✓ Loaded {} records\n", count),
        _ => {
            if let DatasetState::Error(message) = &*controller.dataset() {
                println!("⚠️  {} (press F5 in the scanner to retry)\n", message);
            }
        }
    }
    println!("Starting UI... (Press Esc to quit)\n");

    let mut app = ui::App::new(controller);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin stones-server --features server");
    std::process::exit(1);
}
