use crate::models::TargetStatus;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence failures are surfaced to the caller instead of being swallowed
/// into an empty result, so a store outage is distinguishable from "no data".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("illegal target status transition: {from} -> {to}")]
    IllegalTransition { from: TargetStatus, to: TargetStatus },

    #[error("unknown target id {0}")]
    UnknownTarget(i64),
}
