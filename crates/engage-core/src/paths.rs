use crate::error::{EngageError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

pub const HOME_DIR: &str = ".engagerunner";
pub const CONFIG_FILE: &str = "config.yaml";
pub const LEDGER_FILE: &str = "ledger.redb";
pub const HOME_ENV: &str = "ENGAGERUNNER_HOME";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Resolve the state directory.
///
/// Priority: explicit path (`--home`), then `$ENGAGERUNNER_HOME`, then
/// `~/.engagerunner`.
pub fn resolve_home(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Some(p) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    home::home_dir()
        .map(|h| h.join(HOME_DIR))
        .ok_or(EngageError::HomeNotFound)
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
}

pub fn ledger_path(home: &Path) -> PathBuf {
    home.join(LEDGER_FILE)
}
