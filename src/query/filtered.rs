//! Queries carrying a boolean filter.

use crate::error::{QueryError, Result};
use crate::expression::{translate, DataType, Evaluator, Expression};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct FilteredQueryRepr {
    filter: Expression,
}

/// Holds a filter expression, which is always boolean-typed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FilteredQueryRepr", into = "FilteredQueryRepr")]
pub struct FilteredQuery {
    filter: Expression,
}

impl FilteredQuery {
    /// Fails with `TypeCompatibility` unless `filter` is boolean.
    pub fn new(filter: Expression) -> Result<Self> {
        check_filter(&filter)?;
        Ok(Self { filter })
    }

    /// A filter that excludes everything.
    pub fn exclude_all() -> Self {
        Self {
            filter: Expression::constant(false),
        }
    }

    pub fn filter(&self) -> &Expression {
        &self.filter
    }

    /// Replaces the filter. On failure the previous filter is kept.
    pub fn set_filter(&mut self, filter: Expression) -> Result<()> {
        check_filter(&filter)?;
        self.filter = filter;
        Ok(())
    }

    /// Compiles the filter for evaluation.
    pub fn evaluator(&self) -> Result<Evaluator> {
        translate(&self.filter)
    }
}

impl Default for FilteredQuery {
    fn default() -> Self {
        Self {
            filter: Expression::constant(true),
        }
    }
}

fn check_filter(filter: &Expression) -> Result<()> {
    let data_type = filter.data_type();
    if data_type != DataType::Bool {
        return Err(QueryError::TypeCompatibility(format!(
            "filter must be bool, found {}",
            data_type
        )));
    }
    Ok(())
}

impl TryFrom<FilteredQueryRepr> for FilteredQuery {
    type Error = QueryError;

    fn try_from(repr: FilteredQueryRepr) -> Result<Self> {
        FilteredQuery::new(repr.filter)
    }
}

impl From<FilteredQuery> for FilteredQueryRepr {
    fn from(query: FilteredQuery) -> Self {
        FilteredQueryRepr {
            filter: query.filter,
        }
    }
}
