//! Stage execution engine and storage port definitions for Stagecoach.
//!
//! This crate defines the `SyncStore` port that backends implement and the
//! engine that drives a workflow instance through its stages against it. It
//! depends only on `stagecoach-types` -- never on `stagecoach-infra` or any
//! database/IO crate.

pub mod sync;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
