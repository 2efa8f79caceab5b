pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod ledger;
pub mod orchestrator;
pub mod pacing;
pub mod paths;
pub mod recency;
pub mod selection;
pub mod types;

pub use error::{EngageError, Result};
