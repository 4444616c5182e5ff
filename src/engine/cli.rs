//! Top-level command handling: config merge, store setup, crawl or import.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use super::arg_parser::Cli;
use super::pool::Pool;
use crate::error::CancelReason;
use crate::store::{SqliteStore, Store};
use crate::types::{Department, Employee, Record};
use crate::utils::logger::setup_logging;
use crate::utils::orgdex_toml::{apply_file_to_cli, load_orgdex_toml};

pub fn handle_run(mut cli: Cli) -> Result<()> {
    if let Some(file) = load_orgdex_toml(Path::new(".")) {
        apply_file_to_cli(&file, &mut cli);
    }
    setup_logging(cli.verbose);

    let db_path = cli.db_path();
    let store: Arc<SqliteStore> = Arc::new(SqliteStore::open(&db_path)?);
    info!("database: {}", db_path.display());

    if let Some(dir) = cli.from_file.clone() {
        return import_from_dir(&dir, store.as_ref());
    }

    let cfg = cli.to_config()?;
    let pool = Pool::new(cfg, store.clone());
    let token = pool.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel(CancelReason::Interrupt)) {
        warn!("Ctrl+C handler not installed: {e}");
    }

    let counts = pool.run()?;
    info!(
        "collected {} employees in {} departments",
        counts.leaves, counts.branches
    );
    store.flush()?;
    Ok(())
}

/// Offline ingestion: read `departments.json` and `employees.json` (one JSON
/// object per line) from `dir` and run them through the same save path the
/// crawl uses, then checkpoint. Unparseable lines are logged and skipped; a
/// missing file skips that kind entirely.
fn import_from_dir(dir: &Path, store: &dyn Store) -> Result<()> {
    import_lines(&dir.join("departments.json"), store, |line| {
        Ok(Record::Branch(serde_json::from_str::<Department>(line)?))
    })?;
    import_lines(&dir.join("employees.json"), store, |line| {
        Ok(Record::Leaf(serde_json::from_str::<Employee>(line)?))
    })?;
    store.flush()
}

fn import_lines(
    path: &Path,
    store: &dyn Store,
    parse: impl Fn(&str) -> Result<Record>,
) -> Result<()> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{}: not found, skipping", path.display());
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
    };

    let mut imported = 0u64;
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(record) => {
                store
                    .save(&record)
                    .with_context(|| format!("{} line {}", path.display(), lineno + 1))?;
                imported += 1;
            }
            Err(e) => error!("{} line {}: {e}", path.display(), lineno + 1),
        }
    }
    info!("{}: imported {imported} records", path.display());
    Ok(())
}
