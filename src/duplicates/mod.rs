//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Grouping scan records by fingerprint namespace
//! - Choosing one keeper per group under a [`KeeperPolicy`]

pub mod groups;
pub mod keeper;

pub use groups::{group_all, group_by_fingerprint, DuplicateGroup, GroupingStats};
pub use keeper::{partition, select_keeper, KeeperPolicy};
