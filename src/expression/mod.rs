//! Expressions and their evaluation.
//!
//! Callers build an [`Expression`] tree directly (there is no text parser)
//! and compile it with [`translate`]. The resulting [`Evaluator`] is what
//! filters, expression subscriptions and stores run against each value.
//!
//! # Example
//!
//! ```ignore
//! let filter = Expression::greater(
//!     Expression::member("price", DataType::Decimal,
//!         Expression::parameter(0, DataType::Record("Quote".into()))),
//!     Expression::constant(10),
//! );
//! let mut evaluator = translate(&filter)?;
//! if test_filter(&mut evaluator, &quote) {
//!     // deliver
//! }
//! ```

mod evaluator;
mod tree;
mod value;

pub use evaluator::{test_filter, translate, EvalError, Evaluator, MAX_EVALUATOR_PARAMETERS};
pub use tree::{Expression, Function};
pub use value::{Bindable, DataType, FromValue, Value};
