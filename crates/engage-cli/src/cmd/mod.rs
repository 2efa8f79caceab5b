pub mod config;
pub mod engage;
pub mod init;
pub mod ledger;
pub mod reply;
pub mod videos;
