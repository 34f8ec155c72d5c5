//! Compiled expressions.
//!
//! `translate` type-checks an [`Expression`] and lowers it to an
//! [`Evaluator`]. Evaluation binds up to [`MAX_EVALUATOR_PARAMETERS`]
//! positional parameters by reference and returns `Result<_, EvalError>`;
//! filter call sites go through [`test_filter`], which treats any error as
//! "excluded".

use super::tree::{Expression, Function};
use super::value::{Bindable, DataType, FromValue, Value};
use crate::error::{QueryError, Result};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

/// Maximum number of parameters an evaluator may bind.
pub const MAX_EVALUATOR_PARAMETERS: usize = 2;

/// Failure while evaluating a compiled expression against concrete values.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvalError {
    /// Integer division by zero. Decimal division follows IEEE 754 and
    /// yields an infinity or NaN instead.
    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("parameter {0} is not bound")]
    UnboundParameter(usize),

    #[error("no member named {0}")]
    MissingMember(String),

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
}

#[derive(Clone, Debug)]
enum Node {
    Constant(Value),
    Parameter {
        slot: usize,
        data_type: DataType,
    },
    Member {
        slot: usize,
        name: String,
    },
    Function {
        function: Function,
        left: Box<Node>,
        right: Box<Node>,
    },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Reduce {
        reducer: Box<Node>,
        series: Box<Node>,
        accumulator: Value,
    },
}

/// A compiled, parameterized computation.
///
/// Evaluation takes `&mut self` because `Reduce` nodes carry their
/// accumulator from one evaluation to the next. Each subscription owns its
/// own copy.
#[derive(Clone, Debug)]
pub struct Evaluator {
    root: Node,
    parameter_count: usize,
    data_type: DataType,
}

impl Evaluator {
    /// An evaluator that always yields `value`.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            data_type: value.data_type(),
            root: Node::Constant(value),
            parameter_count: 0,
        }
    }

    /// Static type of the result.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Number of parameters the expression refers to.
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Evaluates against positional parameters.
    pub fn evaluate(&mut self, parameters: &[&dyn Bindable]) -> std::result::Result<Value, EvalError> {
        evaluate_node(&mut self.root, parameters)
    }

    /// Evaluates with no parameters bound.
    pub fn eval<R: FromValue>(&mut self) -> std::result::Result<R, EvalError> {
        R::from_value(self.evaluate(&[])?)
    }

    /// Evaluates with `p0` bound to parameter 0.
    pub fn eval_with<R: FromValue>(&mut self, p0: &dyn Bindable) -> std::result::Result<R, EvalError> {
        R::from_value(self.evaluate(&[p0])?)
    }

    /// Evaluates with `p0` and `p1` bound to parameters 0 and 1.
    pub fn eval_with2<R: FromValue>(
        &mut self,
        p0: &dyn Bindable,
        p1: &dyn Bindable,
    ) -> std::result::Result<R, EvalError> {
        R::from_value(self.evaluate(&[p0, p1])?)
    }
}

/// Compiles an expression, checking operand types.
pub fn translate(expression: &Expression) -> Result<Evaluator> {
    let mut parameter_count = 0;
    let root = lower(expression, &mut parameter_count)?;
    if parameter_count > MAX_EVALUATOR_PARAMETERS {
        return Err(QueryError::TooManyParameters {
            given: parameter_count,
            max: MAX_EVALUATOR_PARAMETERS,
        });
    }
    Ok(Evaluator {
        root,
        parameter_count,
        data_type: expression.data_type(),
    })
}

/// Evaluates a boolean filter against one value. Any evaluation error
/// excludes the value.
pub fn test_filter(filter: &mut Evaluator, value: &dyn Bindable) -> bool {
    match filter.eval_with::<bool>(value) {
        Ok(passed) => passed,
        Err(e) => {
            debug!(error = %e, "filter evaluation failed, excluding value");
            false
        }
    }
}

// --- Translation ---

fn incompatible(message: String) -> QueryError {
    QueryError::TypeCompatibility(message)
}

fn comparable(left: &DataType, right: &DataType) -> bool {
    (left.is_numeric() && right.is_numeric())
        || (left == right && !matches!(left, DataType::Record(_)))
}

fn lower(expression: &Expression, parameter_count: &mut usize) -> Result<Node> {
    match expression {
        Expression::Constant(value) => Ok(Node::Constant(value.clone())),
        Expression::Parameter { index, data_type } => {
            *parameter_count = (*parameter_count).max(index + 1);
            Ok(Node::Parameter {
                slot: *index,
                data_type: data_type.clone(),
            })
        }
        Expression::MemberAccess {
            name, expression, ..
        } => match expression.as_ref() {
            Expression::Parameter { index, .. } => {
                *parameter_count = (*parameter_count).max(index + 1);
                Ok(Node::Member {
                    slot: *index,
                    name: name.clone(),
                })
            }
            other => Err(incompatible(format!(
                "member {} must be accessed on a parameter, not {}",
                name, other
            ))),
        },
        Expression::Function {
            function,
            arguments,
            ..
        } => {
            let [left, right] = arguments.as_slice() else {
                return Err(incompatible(format!(
                    "{} takes two arguments, got {}",
                    function,
                    arguments.len()
                )));
            };
            let (left_type, right_type) = (left.data_type(), right.data_type());
            let valid = if function.is_arithmetic() {
                left_type.is_numeric() && right_type.is_numeric()
            } else {
                comparable(&left_type, &right_type)
            };
            if !valid {
                return Err(incompatible(format!(
                    "{} is not defined for {} and {}",
                    function, left_type, right_type
                )));
            }
            Ok(Node::Function {
                function: *function,
                left: Box::new(lower(left, parameter_count)?),
                right: Box::new(lower(right, parameter_count)?),
            })
        }
        Expression::And(left, right) | Expression::Or(left, right) => {
            require_bool(left)?;
            require_bool(right)?;
            let left = Box::new(lower(left, parameter_count)?);
            let right = Box::new(lower(right, parameter_count)?);
            Ok(match expression {
                Expression::And(..) => Node::And(left, right),
                _ => Node::Or(left, right),
            })
        }
        Expression::Not(operand) => {
            require_bool(operand)?;
            Ok(Node::Not(Box::new(lower(operand, parameter_count)?)))
        }
        Expression::Reduce {
            reducer,
            series,
            initial,
        } => {
            let reducer_type = reducer.data_type();
            let initial_type = initial.data_type();
            let series_type = series.data_type();
            if reducer_type != initial_type || reducer_type != series_type {
                return Err(incompatible(format!(
                    "reducer yields {} but starts from {} over a series of {}",
                    reducer_type, initial_type, series_type
                )));
            }
            // The reducer binds its own two parameters: accumulator and item.
            let mut reducer_parameters = 0;
            let reducer = lower(reducer, &mut reducer_parameters)?;
            if reducer_parameters > MAX_EVALUATOR_PARAMETERS {
                return Err(QueryError::TooManyParameters {
                    given: reducer_parameters,
                    max: MAX_EVALUATOR_PARAMETERS,
                });
            }
            Ok(Node::Reduce {
                reducer: Box::new(reducer),
                series: Box::new(lower(series, parameter_count)?),
                accumulator: initial.clone(),
            })
        }
    }
}

fn require_bool(expression: &Expression) -> Result<()> {
    let data_type = expression.data_type();
    if data_type == DataType::Bool {
        Ok(())
    } else {
        Err(incompatible(format!(
            "expected bool operand, found {} in {}",
            data_type, expression
        )))
    }
}

// --- Evaluation ---

fn mismatch(expected: &str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        expected: expected.to_string(),
        found: found.data_type().to_string(),
    }
}

fn evaluate_bool(node: &mut Node, parameters: &[&dyn Bindable]) -> std::result::Result<bool, EvalError> {
    match evaluate_node(node, parameters)? {
        Value::Bool(v) => Ok(v),
        other => Err(mismatch("bool", &other)),
    }
}

fn evaluate_node(node: &mut Node, parameters: &[&dyn Bindable]) -> std::result::Result<Value, EvalError> {
    match node {
        Node::Constant(value) => Ok(value.clone()),
        Node::Parameter { slot, data_type } => {
            let parameter = parameters
                .get(*slot)
                .ok_or(EvalError::UnboundParameter(*slot))?;
            parameter.as_value().ok_or_else(|| EvalError::TypeMismatch {
                expected: data_type.to_string(),
                found: "record".to_string(),
            })
        }
        Node::Member { slot, name } => {
            let parameter = parameters
                .get(*slot)
                .ok_or(EvalError::UnboundParameter(*slot))?;
            parameter
                .member(name)
                .ok_or_else(|| EvalError::MissingMember(name.clone()))
        }
        Node::Function {
            function,
            left,
            right,
        } => {
            let left = evaluate_node(left, parameters)?;
            let right = evaluate_node(right, parameters)?;
            apply(*function, left, right)
        }
        Node::And(left, right) => {
            Ok(Value::Bool(evaluate_bool(left, parameters)? && evaluate_bool(right, parameters)?))
        }
        Node::Or(left, right) => {
            Ok(Value::Bool(evaluate_bool(left, parameters)? || evaluate_bool(right, parameters)?))
        }
        Node::Not(operand) => Ok(Value::Bool(!evaluate_bool(operand, parameters)?)),
        Node::Reduce {
            reducer,
            series,
            accumulator,
        } => {
            let item = evaluate_node(series, parameters)?;
            let current = accumulator.clone();
            let next = evaluate_node(reducer, &[&current, &item])?;
            *accumulator = next.clone();
            Ok(next)
        }
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Int(l), Value::Decimal(r)) => (*l as f64).partial_cmp(r),
        (Value::Decimal(l), Value::Int(r)) => l.partial_cmp(&(*r as f64)),
        (Value::Decimal(l), Value::Decimal(r)) => l.partial_cmp(r),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Timestamp(l), Value::Timestamp(r)) => l.partial_cmp(r),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> std::result::Result<f64, EvalError> {
    match value {
        Value::Int(v) => Ok(*v as f64),
        Value::Decimal(v) => Ok(*v),
        other => Err(mismatch("decimal", other)),
    }
}

fn arithmetic(function: Function, left: Value, right: Value) -> std::result::Result<Value, EvalError> {
    if let (Value::Int(l), Value::Int(r)) = (&left, &right) {
        let result = match function {
            Function::Add => l.checked_add(*r),
            Function::Subtract => l.checked_sub(*r),
            Function::Multiply => l.checked_mul(*r),
            _ => {
                if *r == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                l.checked_div(*r)
            }
        };
        return result.map(Value::Int).ok_or(EvalError::Overflow);
    }
    let (l, r) = (as_decimal(&left)?, as_decimal(&right)?);
    Ok(Value::Decimal(match function {
        Function::Add => l + r,
        Function::Subtract => l - r,
        Function::Multiply => l * r,
        _ => l / r,
    }))
}

fn apply(function: Function, left: Value, right: Value) -> std::result::Result<Value, EvalError> {
    if function.is_arithmetic() {
        return arithmetic(function, left, right);
    }
    if !comparable(&left.data_type(), &right.data_type()) {
        return Err(mismatch(&left.data_type().to_string(), &right));
    }
    let ordering = compare(&left, &right);
    let mixed = left.data_type() != right.data_type();
    match function {
        Function::Max | Function::Min => {
            let keep_left = if function == Function::Max {
                ordering != Some(Ordering::Less)
            } else {
                ordering != Some(Ordering::Greater)
            };
            let winner = if keep_left { left } else { right };
            // Mixed Int and Decimal operands yield a Decimal.
            Ok(match winner {
                Value::Int(v) if mixed => Value::Decimal(v as f64),
                other => other,
            })
        }
        Function::Less => Ok(Value::Bool(ordering == Some(Ordering::Less))),
        Function::LessEquals => Ok(Value::Bool(matches!(
            ordering,
            Some(Ordering::Less | Ordering::Equal)
        ))),
        Function::Equals => Ok(Value::Bool(ordering == Some(Ordering::Equal))),
        Function::NotEquals => Ok(Value::Bool(ordering != Some(Ordering::Equal))),
        Function::GreaterEquals => Ok(Value::Bool(matches!(
            ordering,
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        _ => Ok(Value::Bool(ordering == Some(Ordering::Greater))),
    }
}
