//! Storage key layout shared by all backends.
//!
//! The result record of an instance and the lease of one of its stages live
//! in disjoint namespaces, so locking a stage can never touch the record the
//! stage writes its result into.

/// Prefix of per-instance result records.
pub const DATA_PREFIX: &str = "data:";

/// Prefix of per-(instance, stage) lease records.
pub const LOCK_PREFIX: &str = "lock:";

/// Key of the result record for instance `id`.
pub fn data_key(id: &str) -> String {
    format!("{DATA_PREFIX}{id}")
}

/// Key of the lease for stage `stage` of instance `id`.
///
/// The id is length-prefixed so ids and stage names containing `:` cannot
/// produce the same key for different pairs.
pub fn lock_key(id: &str, stage: &str) -> String {
    format!("{LOCK_PREFIX}{}:{id}:{stage}", id.len())
}
