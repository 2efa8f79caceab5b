use crate::output::{print_json, print_pairs, print_table};
use anyhow::Context;
use clap::Subcommand;
use engage_core::ledger::Ledger;
use engage_core::paths;
use engage_core::types::{ActionKind, ActionRecord};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum LedgerSubcommand {
    /// List successful actions, oldest first
    List,

    /// List actions that failed after exhausting retries
    Audit,

    /// Counts per action
    Stats,

    /// Check whether an action was already performed on an item
    Check {
        /// Comment id
        item_id: String,
        /// like or heart
        action: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(home: &Path, subcmd: LedgerSubcommand, json: bool) -> anyhow::Result<()> {
    let ledger = Ledger::open(&paths::ledger_path(home)).context("failed to open ledger")?;
    match subcmd {
        LedgerSubcommand::List => print_records(&ledger.list(), json),
        LedgerSubcommand::Audit => print_records(&ledger.audit()?, json),
        LedgerSubcommand::Stats => stats(&ledger, json),
        LedgerSubcommand::Check { item_id, action } => check(&ledger, &item_id, &action, json),
    }
}

fn print_records(records: &[ActionRecord], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No records.");
        return Ok(());
    }
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.item_id.clone(),
                r.action.to_string(),
                r.result.to_string(),
                r.performed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(&["COMMENT", "ACTION", "RESULT", "AT (UTC)"], rows);
    Ok(())
}

fn stats(ledger: &Ledger, json: bool) -> anyhow::Result<()> {
    let stats = ledger.stats()?;
    if json {
        return print_json(&stats);
    }
    let mut pairs = vec![("successes", stats.successes.to_string())];
    for kind in ActionKind::all() {
        let n = stats.by_action.get(kind).copied().unwrap_or(0);
        pairs.push((kind.as_str(), n.to_string()));
    }
    pairs.push(("audit entries", stats.audit_entries.to_string()));
    print_pairs(&pairs);
    Ok(())
}

fn check(ledger: &Ledger, item_id: &str, action: &str, json: bool) -> anyhow::Result<()> {
    let action: ActionKind = action.parse()?;
    let done = ledger.has(item_id, action);
    if json {
        let value = serde_json::json!({
            "item_id": item_id,
            "action": action,
            "done": done,
        });
        return print_json(&value);
    }
    if done {
        println!("{item_id}: {action} already performed");
    } else {
        println!("{item_id}: {action} not performed");
    }
    Ok(())
}
