//! Engine error taxonomy.

use thiserror::Error;

/// Errors that can occur in the terminology graph engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Branch path is malformed or its parent branch does not exist.
    #[error("Invalid branch path: {path}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },

    /// Branch does not exist.
    #[error("Branch not found: {path}")]
    BranchNotFound {
        /// The path that was not found.
        path: String,
    },

    /// A concurrent commit holds the branch lock. Callers should retry
    /// with backoff; the engine never retries internally.
    #[error("Branch is locked by a concurrent commit: {path}")]
    ConcurrentModification {
        /// The contended branch path.
        path: String,
    },

    /// A cycle was detected in the is-a graph during closure computation.
    /// The affected rebuild is abandoned; existing closure entries are
    /// left untouched.
    #[error("Cyclic hierarchy detected at concept {concept_id} on branch {path}")]
    CyclicHierarchy {
        /// A concept participating in the cycle.
        concept_id: u64,
        /// The branch whose closure rebuild failed.
        path: String,
    },

    /// Malformed constraint-language text.
    #[error("Syntax error at position {position}: {message}")]
    SyntaxError {
        /// Byte offset of the offending token in the query text.
        position: usize,
        /// What the parser expected.
        message: String,
    },

    /// Evaluation failed in the item-by-item fallback path.
    #[error("Evaluation error in constraint fragment '{fragment}': {message}")]
    EvaluationError {
        /// Serialized form of the AST fragment that failed.
        fragment: String,
        /// Why evaluation failed.
        message: String,
    },

    /// A merge review is no longer current because a branch advanced.
    /// Non-fatal; callers re-request a fresh review.
    #[error("Merge review {review_id} is stale")]
    StaleReview {
        /// The stale review's identifier.
        review_id: u64,
    },

    /// A collaborating store failed. Never masked by partial results.
    #[error("Backing store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
