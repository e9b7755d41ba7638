//! drivetidy - drive inventory, duplicate cleanup and reversible organization
//!
//! Scans a tree into JSON-Lines records carrying content fingerprints in
//! several namespaces, groups duplicates, picks keepers by policy, and
//! moves, hard-links or copies files through a logged engine whose every
//! step can be undone.

pub mod actions;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;

pub use app::run_app;
