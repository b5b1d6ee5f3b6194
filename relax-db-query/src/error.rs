//! Error types for query execution

use crate::var_registry::VarId;
use thiserror::Error;

/// Query execution errors
///
/// Variants fall into four groups:
/// - source failures reported by scans (`Source`), propagated unchanged
/// - protocol misuse (`NoElement`, `OperatorNotOpened`, `OperatorClosed`)
/// - invariant violations that indicate a compiler or planner bug
///   (`UnboundJoinVariable`, `BindingConflict`, `Internal`)
/// - plan, query and configuration construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Underlying scan failed (I/O, transport, store)
    #[error("Source error: {0}")]
    Source(String),

    /// `next()` called on a stream with nothing left
    #[error("No element available - has_next() is false")]
    NoElement,

    /// Operator not opened
    #[error("Operator not opened - call open() before has_next()/next()")]
    OperatorNotOpened,

    /// Operator is closed
    #[error("Operator is closed")]
    OperatorClosed,

    /// A tuple reached a join without a binding for the join variable
    #[error("Join variable {var:?} unbound in tuple from '{query}'")]
    UnboundJoinVariable { var: VarId, query: String },

    /// A variable was bound twice to different constants
    #[error("Variable {var:?} already bound to '{existing}', cannot rebind to '{attempted}'")]
    BindingConflict {
        var: VarId,
        existing: String,
        attempted: String,
    },

    /// Relations that share no variable, directly or transitively
    #[error("Join graph is disconnected: relations {unreachable:?} share no variable with relation 0")]
    DisconnectedJoinGraph { unreachable: Vec<usize> },

    /// Invalid logical plan
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// Invalid query text or query structure
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid engine configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        QueryError::Source(msg.into())
    }

    /// Create an invalid plan error
    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        QueryError::InvalidPlan(msg.into())
    }

    /// Create an invalid query error
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        QueryError::InvalidQuery(msg.into())
    }

    /// True for errors that indicate a bug in plan construction rather than
    /// bad input or a failing source.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            QueryError::UnboundJoinVariable { .. }
                | QueryError::BindingConflict { .. }
                | QueryError::Internal(_)
        )
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::InvalidConfig(err.to_string())
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
