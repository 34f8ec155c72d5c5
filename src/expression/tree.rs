//! Expression trees handed to the evaluator.

use super::value::{DataType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The standard binary functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    LessEquals,
    Equals,
    NotEquals,
    GreaterEquals,
    Greater,
    Max,
    Min,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::Add => "+",
            Function::Subtract => "-",
            Function::Multiply => "*",
            Function::Divide => "/",
            Function::Less => "<",
            Function::LessEquals => "<=",
            Function::Equals => "==",
            Function::NotEquals => "!=",
            Function::GreaterEquals => ">=",
            Function::Greater => ">",
            Function::Max => "max",
            Function::Min => "min",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Function::Add | Function::Subtract | Function::Multiply | Function::Divide
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Function::Less
                | Function::LessEquals
                | Function::Equals
                | Function::NotEquals
                | Function::GreaterEquals
                | Function::Greater
        )
    }

    /// Result type of applying this function to operands of the given types.
    fn result_type(self, left: &DataType, right: &DataType) -> DataType {
        if self.is_comparison() {
            DataType::Bool
        } else if *left == DataType::Int && *right == DataType::Decimal {
            DataType::Decimal
        } else {
            left.clone()
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An expression over constants and bound parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Constant(Value),
    Parameter {
        index: usize,
        data_type: DataType,
    },
    MemberAccess {
        name: String,
        data_type: DataType,
        expression: Box<Expression>,
    },
    Function {
        function: Function,
        data_type: DataType,
        arguments: Vec<Expression>,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    /// Folds `series` into an accumulator with `reducer`, whose parameter 0
    /// is the accumulator and parameter 1 the next series value.
    Reduce {
        reducer: Box<Expression>,
        series: Box<Expression>,
        initial: Value,
    },
}

impl Expression {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn parameter(index: usize, data_type: DataType) -> Self {
        Expression::Parameter { index, data_type }
    }

    pub fn member(name: impl Into<String>, data_type: DataType, expression: Expression) -> Self {
        Expression::MemberAccess {
            name: name.into(),
            data_type,
            expression: Box::new(expression),
        }
    }

    pub fn function(function: Function, left: Expression, right: Expression) -> Self {
        let data_type = function.result_type(&left.data_type(), &right.data_type());
        Expression::Function {
            function,
            data_type,
            arguments: vec![left, right],
        }
    }

    pub fn add(left: Expression, right: Expression) -> Self {
        Self::function(Function::Add, left, right)
    }

    pub fn subtract(left: Expression, right: Expression) -> Self {
        Self::function(Function::Subtract, left, right)
    }

    pub fn multiply(left: Expression, right: Expression) -> Self {
        Self::function(Function::Multiply, left, right)
    }

    pub fn divide(left: Expression, right: Expression) -> Self {
        Self::function(Function::Divide, left, right)
    }

    pub fn less(left: Expression, right: Expression) -> Self {
        Self::function(Function::Less, left, right)
    }

    pub fn less_equals(left: Expression, right: Expression) -> Self {
        Self::function(Function::LessEquals, left, right)
    }

    pub fn equals(left: Expression, right: Expression) -> Self {
        Self::function(Function::Equals, left, right)
    }

    pub fn not_equals(left: Expression, right: Expression) -> Self {
        Self::function(Function::NotEquals, left, right)
    }

    pub fn greater_equals(left: Expression, right: Expression) -> Self {
        Self::function(Function::GreaterEquals, left, right)
    }

    pub fn greater(left: Expression, right: Expression) -> Self {
        Self::function(Function::Greater, left, right)
    }

    pub fn max(left: Expression, right: Expression) -> Self {
        Self::function(Function::Max, left, right)
    }

    pub fn min(left: Expression, right: Expression) -> Self {
        Self::function(Function::Min, left, right)
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    pub fn not(operand: Expression) -> Self {
        Expression::Not(Box::new(operand))
    }

    pub fn reduce(reducer: Expression, series: Expression, initial: impl Into<Value>) -> Self {
        Expression::Reduce {
            reducer: Box::new(reducer),
            series: Box::new(series),
            initial: initial.into(),
        }
    }

    /// Static type of the expression's result.
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Constant(value) => value.data_type(),
            Expression::Parameter { data_type, .. }
            | Expression::MemberAccess { data_type, .. }
            | Expression::Function { data_type, .. } => data_type.clone(),
            Expression::And(..) | Expression::Or(..) | Expression::Not(_) => DataType::Bool,
            Expression::Reduce { reducer, .. } => reducer.data_type(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "{}", value),
            Expression::Parameter { index, .. } => write!(f, "${}", index),
            Expression::MemberAccess {
                name, expression, ..
            } => write!(f, "{}.{}", expression, name),
            Expression::Function {
                function,
                arguments,
                ..
            } => {
                write!(f, "({}", function)?;
                for argument in arguments {
                    write!(f, " {}", argument)?;
                }
                f.write_str(")")
            }
            Expression::And(left, right) => write!(f, "(and {} {})", left, right),
            Expression::Or(left, right) => write!(f, "(or {} {})", left, right),
            Expression::Not(operand) => write!(f, "(not {})", operand),
            Expression::Reduce {
                reducer,
                series,
                initial,
            } => write!(f, "(reduce {} {} {})", reducer, series, initial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_is_boolean() {
        let expression = Expression::less(Expression::constant(1), Expression::constant(2.5));
        assert_eq!(expression.data_type(), DataType::Bool);
    }

    #[test]
    fn test_int_decimal_promotes() {
        let expression = Expression::add(Expression::constant(1), Expression::constant(2.5));
        assert_eq!(expression.data_type(), DataType::Decimal);
        let expression = Expression::add(Expression::constant(2.5), Expression::constant(1));
        assert_eq!(expression.data_type(), DataType::Decimal);
    }

    #[test]
    fn test_display() {
        let expression = Expression::and(
            Expression::greater(
                Expression::member(
                    "value",
                    DataType::Int,
                    Expression::parameter(0, DataType::Record("Entry".into())),
                ),
                Expression::constant(10),
            ),
            Expression::constant(true),
        );
        assert_eq!(expression.to_string(), "(and (> $0.value 10) true)");
    }
}
