//! Error type shared by every fallible path in the crate.

/// Result alias used throughout the sorting engine.
pub type SortResult<T> = Result<T, SortError>;

/// Failures surfaced while ordering members or tuples.
///
/// Nothing in this crate recovers from these locally; every variant
/// propagates to the query executor, which decides whether to abort the
/// statement (`Cancelled`, `MalformedHierarchy`, `IncomparableValues`) or to
/// load pending cell batches and re-run the sort (`BatchQuantumExceeded`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SortError {
    /// The statement was cancelled or timed out mid-sort.
    #[error("query execution was cancelled or timed out")]
    Cancelled,

    /// Evaluation requested more unloaded cells than the current batch
    /// quantum allows. The caller must load the pending batch and retry the
    /// whole sort; the error is never handled inside the engine.
    #[error("cell batch quantum exceeded while evaluating sort keys")]
    BatchQuantumExceeded,

    /// A hierarchy walk failed to converge, or a comparator that must impose
    /// a total order returned equality for distinct members.
    #[error("malformed hierarchy: {0}")]
    MalformedHierarchy(String),

    /// Two scalar values of incompatible kinds reached a comparison.
    #[error("cannot compare values {left} and {right}")]
    IncomparableValues { left: String, right: String },

    /// Any other failure reported by the expression evaluator.
    #[error("sort key evaluation failed: {0}")]
    Evaluation(String),
}
