//! Error types for queries, subscriptions and publishers.

use crate::expression::EvalError;
use crate::types::QueryId;
use thiserror::Error;

/// Main error type for query operations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum QueryError {
    #[error("Type compatibility error: {0}")]
    TypeCompatibility(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Query interrupted")]
    QueryInterrupted,

    #[error("Pipe broken")]
    PipeBroken,

    #[error("Query already exists: {0}")]
    DuplicateQuery(QueryId),

    #[error("Too many evaluator parameters: {given} (max {max})")]
    TooManyParameters { given: usize, max: usize },

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for QueryError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        QueryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for QueryError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        QueryError::Serialization(e.to_string())
    }
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
