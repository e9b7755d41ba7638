//! File actions module.
//!
//! This module provides functionality for:
//! - Reversible move / hardlink / copy mutations ([`mutate`])
//! - The append-only operation log they write ([`oplog`]) and its reversal ([`undo`])
//! - Planning batches: duplicate resolution ([`dedupe`]), category
//!   organization ([`organize`]) and tag-driven moves ([`tags`])
//!
//! Planning functions never touch the filesystem beyond reading; everything
//! destructive goes through [`MutationEngine::execute`], which logs each
//! completed step before starting the next.
//!
//! ```no_run
//! use drivetidy::actions::{undo_log, UndoOptions};
//! use std::path::Path;
//!
//! let report = undo_log(Path::new("undo.jsonl"), &UndoOptions::default()).unwrap();
//! println!("{}", report.summary());
//! ```

pub mod dedupe;
pub mod fsops;
pub mod mutate;
pub mod oplog;
pub mod organize;
pub mod tags;
pub mod undo;

// Re-export commonly used types
pub use dedupe::{plan_dedupe, quarantine_destination, DedupeOptions, DedupePlan, LinkMode, PlanError};
pub use mutate::{
    BatchError, BatchReport, ConflictPolicy, FileSnapshot, HardlinkFallback, ItemOutcome,
    MutationConfig, MutationEngine, MutationError, PlannedMutation,
};
pub use oplog::{
    read_log, resolve_journal, MutationKind, MutationRecord, OpLogError, OperationLog, RecordState,
};
pub use organize::{
    guess_category, plan_organize, CategoryOverrides, CategoryRouter, OrganizeOptions,
    OrganizePlan, RouteRule,
};
pub use tags::{plan_move_by_tags, read_tags, tag_tree, write_tags, TagOptions, TagRecord, TagRule, Tagger};
pub use undo::{undo_log, undo_records, UndoAction, UndoOptions, UndoReport};
