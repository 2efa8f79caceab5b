//! Persistent dedup ledger backed by redb.
//!
//! # Table design
//!
//! Two tables share the same key format, `"{item_id}:{action}"`:
//!
//! ```text
//! ledger  key → JSON ActionRecord   (result = success only)
//! audit   key → JSON ActionRecord   (failed / skipped, last writer wins)
//! ```
//!
//! The `ledger` table is the single source of truth for "already done".
//! Success rows are committed with immediate durability before `record`
//! returns, so a crash after `record` never loses the entry. Audit rows are
//! committed with eventual durability and made durable by [`Ledger::flush`].
//!
//! All success keys are loaded into memory on open so `has` never touches
//! disk. The in-memory map is guarded by a mutex that is held across the
//! check-then-write in `record`, which gives each key an exclusive write path.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use redb::{Database, DatabaseError, Durability, ReadableTable, StorageError, TableDefinition};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EngageError, Result};
use crate::types::{record_key, ActionKind, ActionRecord, ActionResult};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

const LEDGER: RecordTable = TableDefinition::new("ledger");
const AUDIT: RecordTable = TableDefinition::new("audit");

fn ledger_err(e: impl Display) -> EngageError {
    EngageError::Ledger(e.to_string())
}

// ---------------------------------------------------------------------------
// LedgerStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerStats {
    pub successes: usize,
    pub by_action: BTreeMap<ActionKind, usize>,
    pub audit_entries: usize,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Durable set of `(item_id, action)` pairs that were performed successfully.
pub struct Ledger {
    db: Database,
    path: PathBuf,
    done: Mutex<HashMap<String, ActionRecord>>,
}

impl Ledger {
    /// Open (or create) the ledger at `path` and load every success record.
    ///
    /// A missing or empty file yields an empty ledger. A file redb reports as
    /// corrupted is moved aside to `<path>.corrupt-<unix_ts>` and a fresh
    /// ledger is started in its place.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::create(path) {
            Ok(db) => db,
            Err(DatabaseError::Storage(StorageError::Corrupted(reason))) => {
                let aside = path.with_extension(format!("redb.corrupt-{}", Utc::now().timestamp()));
                warn!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    %reason,
                    "ledger file is corrupted, starting a fresh ledger"
                );
                std::fs::rename(path, &aside)?;
                Database::create(path).map_err(ledger_err)?
            }
            Err(e) => return Err(ledger_err(e)),
        };

        // Ensure both tables exist before any reads
        let wt = db.begin_write().map_err(ledger_err)?;
        wt.open_table(LEDGER).map_err(ledger_err)?;
        wt.open_table(AUDIT).map_err(ledger_err)?;
        wt.commit().map_err(ledger_err)?;

        let ledger = Self {
            db,
            path: path.to_path_buf(),
            done: Mutex::new(HashMap::new()),
        };
        let loaded = ledger.read_table(LEDGER)?;
        let count = loaded.len();
        {
            let mut done = ledger.lock();
            for record in loaded {
                if record.result == ActionResult::Success {
                    done.insert(record.key(), record);
                }
            }
        }
        info!(path = %path.display(), records = count, "ledger loaded");
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff a success record exists for `(item_id, action)`.
    pub fn has(&self, item_id: &str, action: ActionKind) -> bool {
        self.lock().contains_key(&record_key(item_id, action))
    }

    /// Record the outcome of an action.
    ///
    /// Success results are written to the ledger table; a second success for
    /// the same key is a no-op. Other results go to the audit table and never
    /// make [`Ledger::has`] true. Returns `true` when a new success row was
    /// written.
    pub fn record(&self, item_id: &str, action: ActionKind, result: ActionResult) -> Result<bool> {
        let record = ActionRecord {
            item_id: item_id.to_string(),
            action,
            performed_at: Utc::now(),
            result,
        };
        let key = record.key();

        if result != ActionResult::Success {
            self.write(AUDIT, &key, &record, Durability::Eventual)?;
            debug!(%key, %result, "audit entry written");
            return Ok(false);
        }

        let mut done = self.lock();
        if done.contains_key(&key) {
            debug!(%key, "success already recorded");
            return Ok(false);
        }
        self.write(LEDGER, &key, &record, Durability::Immediate)?;
        done.insert(key, record);
        Ok(true)
    }

    /// Make every committed write durable, including eventual audit rows.
    pub fn flush(&self) -> Result<()> {
        let mut wt = self.db.begin_write().map_err(ledger_err)?;
        wt.set_durability(Durability::Immediate);
        wt.commit().map_err(ledger_err)?;
        debug!(path = %self.path.display(), "ledger flushed");
        Ok(())
    }

    /// Success records, oldest first.
    pub fn list(&self) -> Vec<ActionRecord> {
        let mut records: Vec<ActionRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| {
            a.performed_at
                .cmp(&b.performed_at)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        records
    }

    /// Non-success audit records, oldest first.
    pub fn audit(&self) -> Result<Vec<ActionRecord>> {
        let mut records = self.read_table(AUDIT)?;
        records.sort_by(|a, b| a.performed_at.cmp(&b.performed_at));
        Ok(records)
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        let mut stats = LedgerStats::default();
        for record in self.lock().values() {
            stats.successes += 1;
            *stats.by_action.entry(record.action).or_default() += 1;
        }
        stats.audit_entries = self.read_table(AUDIT)?.len();
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActionRecord>> {
        // A panic while holding the lock cannot leave the map half-updated:
        // inserts happen only after the commit succeeded.
        self.done.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(
        &self,
        table: RecordTable,
        key: &str,
        record: &ActionRecord,
        durability: Durability,
    ) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        let mut wt = self.db.begin_write().map_err(ledger_err)?;
        wt.set_durability(durability);
        {
            let mut t = wt.open_table(table).map_err(ledger_err)?;
            t.insert(key, value.as_slice()).map_err(ledger_err)?;
        }
        wt.commit().map_err(ledger_err)?;
        Ok(())
    }

    fn read_table(&self, table: RecordTable) -> Result<Vec<ActionRecord>> {
        let rt = self.db.begin_read().map_err(ledger_err)?;
        let t = rt.open_table(table).map_err(ledger_err)?;
        let mut out = Vec::new();
        for entry in t.iter().map_err(ledger_err)? {
            let (k, v) = entry.map_err(ledger_err)?;
            match serde_json::from_slice::<ActionRecord>(v.value()) {
                Ok(record) => out.push(record),
                Err(e) => warn!(key = k.value(), error = %e, "skipping unreadable ledger row"),
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, Ledger) {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::open(&dir.path().join("ledger.redb")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn missing_file_is_empty_ledger() {
        let (_dir, ledger) = open_tmp();
        assert!(!ledger.has("c1", ActionKind::Like));
        assert!(ledger.list().is_empty());
        assert_eq!(ledger.stats().unwrap(), LedgerStats::default());
    }

    #[test]
    fn empty_file_is_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.redb");
        std::fs::write(&path, b"").unwrap();
        let ledger = Ledger::open(&path).unwrap();
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state/ledger.redb");
        Ledger::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn record_success_then_has() {
        let (_dir, ledger) = open_tmp();
        assert!(ledger.record("c1", ActionKind::Heart, ActionResult::Success).unwrap());
        assert!(ledger.has("c1", ActionKind::Heart));
        assert!(!ledger.has("c1", ActionKind::Like), "keys are per action");
    }

    #[test]
    fn second_success_is_noop() {
        let (_dir, ledger) = open_tmp();
        assert!(ledger.record("c1", ActionKind::Like, ActionResult::Success).unwrap());
        assert!(!ledger.record("c1", ActionKind::Like, ActionResult::Success).unwrap());
        assert_eq!(ledger.list().len(), 1);
        assert_eq!(ledger.stats().unwrap().successes, 1);
    }

    #[test]
    fn failed_result_goes_to_audit_only() {
        let (_dir, ledger) = open_tmp();
        assert!(!ledger.record("c1", ActionKind::Like, ActionResult::Failed).unwrap());
        assert!(!ledger.has("c1", ActionKind::Like));
        let audit = ledger.audit().unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].result, ActionResult::Failed);

        // A later success still lands in the ledger
        assert!(ledger.record("c1", ActionKind::Like, ActionResult::Success).unwrap());
        assert!(ledger.has("c1", ActionKind::Like));
    }

    #[test]
    fn audit_is_last_writer_wins_per_key() {
        let (_dir, ledger) = open_tmp();
        ledger.record("c1", ActionKind::Like, ActionResult::Failed).unwrap();
        ledger.record("c1", ActionKind::Like, ActionResult::Skipped).unwrap();
        let audit = ledger.audit().unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].result, ActionResult::Skipped);
    }

    #[test]
    fn reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.redb");
        {
            let ledger = Ledger::open(&path).unwrap();
            ledger.record("c1", ActionKind::Heart, ActionResult::Success).unwrap();
            ledger.record("c2", ActionKind::Like, ActionResult::Failed).unwrap();
            ledger.flush().unwrap();
        }
        let reopened = Ledger::open(&path).unwrap();
        assert!(reopened.has("c1", ActionKind::Heart));
        assert!(!reopened.has("c2", ActionKind::Like));
        assert_eq!(reopened.audit().unwrap().len(), 1);
    }

    #[test]
    fn stats_count_by_action() {
        let (_dir, ledger) = open_tmp();
        ledger.record("c1", ActionKind::Heart, ActionResult::Success).unwrap();
        ledger.record("c2", ActionKind::Heart, ActionResult::Success).unwrap();
        ledger.record("c2", ActionKind::Like, ActionResult::Success).unwrap();
        ledger.record("c3", ActionKind::Like, ActionResult::Failed).unwrap();
        let stats = ledger.stats().unwrap();
        assert_eq!(stats.successes, 3);
        assert_eq!(stats.by_action[&ActionKind::Heart], 2);
        assert_eq!(stats.by_action[&ActionKind::Like], 1);
        assert_eq!(stats.audit_entries, 1);
    }

    #[test]
    fn concurrent_success_writes_keep_one_record() {
        let (_dir, ledger) = open_tmp();
        let ledger = Arc::new(ledger);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    ledger
                        .record("c1", ActionKind::Like, ActionResult::Success)
                        .unwrap()
                })
            })
            .collect();
        let written: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(written, 1);
        assert_eq!(ledger.list().len(), 1);
    }
}
