#![deny(clippy::mod_module_files)]
//! Sync Apps Script projects stored in Google Drive with a local directory.
//!
//! The engine modules (`script`, `drive`, `session`) report failures as
//! [`error::SyncError`]; the command layer wraps them with `anyhow` context.

pub mod auth;
pub mod commands;
pub mod config;
pub mod drive;
pub mod error;
pub mod script;
pub mod session;
pub mod workspace;
