//! Expression evaluation
//!
//! Evaluates an [`Expr`] against an [`Environment`] to produce a [`Datum`],
//! and infers the column an expression would produce over a schema.

use crate::catalog::{ColumnInfo, DataType, Schema};
use crate::sql::{BinaryOp, Expr, UnaryOp};

use super::aggregate::AggregateFunction;
use super::datum::Datum;
use super::env::Environment;
use super::error::{ExecutorError, ExecutorResult};

impl Expr {
    /// Evaluate this expression in `env`
    pub fn evaluate(&self, env: &Environment<'_>) -> ExecutorResult<Datum> {
        eval(self, env)
    }

    /// Evaluate as a predicate; NULL counts as false
    pub fn evaluate_predicate(&self, env: &Environment<'_>) -> ExecutorResult<bool> {
        eval_predicate(self, env)
    }

    /// Name and type of the column this expression produces over `schema`
    pub fn column_info(&self, schema: &Schema) -> ExecutorResult<ColumnInfo> {
        column_info(self, schema)
    }
}

/// Evaluate an expression in an environment
pub fn eval(expr: &Expr, env: &Environment<'_>) -> ExecutorResult<Datum> {
    match expr {
        Expr::Column(name) => {
            if name.is_wildcard() {
                return Err(ExecutorError::InvalidOperation(format!(
                    "wildcard {} cannot be evaluated",
                    name
                )));
            }
            Ok(env.column_value(name)?.clone())
        }

        Expr::Literal(value) => Ok(value.clone()),

        Expr::BinaryOp { left, op, right } => {
            let lval = eval(left, env)?;
            let rval = eval(right, env)?;
            eval_binary_op(op, &lval, &rval)
        }

        Expr::And(terms) => {
            // false wins over NULL, NULL wins over true
            let mut saw_null = false;
            for term in terms {
                match eval(term, env)?.as_bool() {
                    Some(false) => return Ok(Datum::Bool(false)),
                    Some(true) => {}
                    None => saw_null = true,
                }
            }
            Ok(if saw_null { Datum::Null } else { Datum::Bool(true) })
        }

        Expr::Or(terms) => {
            let mut saw_null = false;
            for term in terms {
                match eval(term, env)?.as_bool() {
                    Some(true) => return Ok(Datum::Bool(true)),
                    Some(false) => {}
                    None => saw_null = true,
                }
            }
            Ok(if saw_null { Datum::Null } else { Datum::Bool(false) })
        }

        Expr::UnaryOp { op, expr } => {
            let val = eval(expr, env)?;
            eval_unary_op(op, &val)
        }

        Expr::Function { name, args, .. } => {
            let arg_vals: Vec<Datum> = args
                .iter()
                .map(|a| eval(a, env))
                .collect::<Result<_, _>>()?;
            eval_function(name, &arg_vals)
        }

        Expr::IsNull { expr, negated } => {
            let val = eval(expr, env)?;
            let is_null = val.is_null();
            Ok(Datum::Bool(if *negated { !is_null } else { is_null }))
        }

        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let val = eval(expr, env)?;
            if val.is_null() {
                return Ok(Datum::Null);
            }
            let mut found = false;
            let mut saw_null = false;
            for item in list {
                let item_val = eval(item, env)?;
                if item_val.is_null() {
                    saw_null = true;
                    continue;
                }
                if val == item_val {
                    found = true;
                    break;
                }
            }
            if !found && saw_null {
                return Ok(Datum::Null);
            }
            Ok(Datum::Bool(if *negated { !found } else { found }))
        }

        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let val = eval(expr, env)?;
            let low_val = eval(low, env)?;
            let high_val = eval(high, env)?;

            if val.is_null() || low_val.is_null() || high_val.is_null() {
                return Ok(Datum::Null);
            }

            let in_range = val >= low_val && val <= high_val;
            Ok(Datum::Bool(if *negated { !in_range } else { in_range }))
        }

        Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists(_) => Err(unresolved(expr)),
    }
}

/// Evaluate a predicate; anything but TRUE is false
pub fn eval_predicate(expr: &Expr, env: &Environment<'_>) -> ExecutorResult<bool> {
    match eval(expr, env)? {
        Datum::Bool(b) => Ok(b),
        Datum::Null => Ok(false),
        Datum::Int(i) => Ok(i != 0),
        other => Err(ExecutorError::TypeMismatch {
            expected: DataType::Boolean,
            got: other.data_type().unwrap_or(DataType::Null),
            context: format!("predicate {}", expr),
        }),
    }
}

fn overflow() -> ExecutorError {
    ExecutorError::InvalidOperation("integer overflow".to_string())
}

/// Evaluate a binary operation
fn eval_binary_op(op: &BinaryOp, left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    // Every binary operator propagates NULL
    if left.is_null() || right.is_null() {
        return Ok(Datum::Null);
    }

    match op {
        // Arithmetic
        BinaryOp::Add => eval_add(left, right),
        BinaryOp::Sub => eval_sub(left, right),
        BinaryOp::Mul => eval_mul(left, right),
        BinaryOp::Div => eval_div(left, right),
        BinaryOp::Mod => eval_mod(left, right),

        // Comparison
        BinaryOp::Eq => Ok(Datum::Bool(left == right)),
        BinaryOp::NotEq => Ok(Datum::Bool(left != right)),
        BinaryOp::Lt => Ok(Datum::Bool(left < right)),
        BinaryOp::LtEq => Ok(Datum::Bool(left <= right)),
        BinaryOp::Gt => Ok(Datum::Bool(left > right)),
        BinaryOp::GtEq => Ok(Datum::Bool(left >= right)),

        // String
        BinaryOp::Like => left
            .like(right)
            .ok_or_else(|| ExecutorError::InvalidOperation("LIKE requires strings".to_string())),
        BinaryOp::NotLike => {
            let result = left.like(right).ok_or_else(|| {
                ExecutorError::InvalidOperation("NOT LIKE requires strings".to_string())
            })?;
            match result {
                Datum::Bool(b) => Ok(Datum::Bool(!b)),
                Datum::Null => Ok(Datum::Null),
                _ => Err(ExecutorError::InvalidOperation(
                    "LIKE produced non-bool".to_string(),
                )),
            }
        }
    }
}

pub(crate) fn eval_add(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_add(*b).map(Datum::Int).ok_or_else(overflow),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a + b)),
        (Datum::Int(a), Datum::Float(b)) | (Datum::Float(b), Datum::Int(a)) => {
            Ok(Datum::Float(*a as f64 + b))
        }
        (Datum::String(a), Datum::String(b)) => Ok(Datum::String(format!("{}{}", a, b))),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot add {:?} and {:?}",
            left, right
        ))),
    }
}

fn eval_sub(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_sub(*b).map(Datum::Int).ok_or_else(overflow),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a - b)),
        (Datum::Int(a), Datum::Float(b)) => Ok(Datum::Float(*a as f64 - b)),
        (Datum::Float(a), Datum::Int(b)) => Ok(Datum::Float(a - *b as f64)),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot subtract {:?} from {:?}",
            right, left
        ))),
    }
}

fn eval_mul(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_mul(*b).map(Datum::Int).ok_or_else(overflow),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a * b)),
        (Datum::Int(a), Datum::Float(b)) | (Datum::Float(b), Datum::Int(a)) => {
            Ok(Datum::Float(*a as f64 * b))
        }
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot multiply {:?} and {:?}",
            left, right
        ))),
    }
}

fn eval_div(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    // Check for division by zero
    match right {
        Datum::Int(0) => {
            return Err(ExecutorError::InvalidOperation(
                "division by zero".to_string(),
            ))
        }
        Datum::Float(f) if *f == 0.0 => {
            return Err(ExecutorError::InvalidOperation(
                "division by zero".to_string(),
            ))
        }
        _ => {}
    }

    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_div(*b).map(Datum::Int).ok_or_else(overflow),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a / b)),
        (Datum::Int(a), Datum::Float(b)) => Ok(Datum::Float(*a as f64 / b)),
        (Datum::Float(a), Datum::Int(b)) => Ok(Datum::Float(a / *b as f64)),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot divide {:?} by {:?}",
            left, right
        ))),
    }
}

fn eval_mod(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    if let Datum::Int(0) = right {
        return Err(ExecutorError::InvalidOperation(
            "modulo by zero".to_string(),
        ));
    }

    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_rem(*b).map(Datum::Int).ok_or_else(overflow),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot compute modulo of {:?} and {:?}",
            left, right
        ))),
    }
}

/// Evaluate a unary operation
fn eval_unary_op(op: &UnaryOp, val: &Datum) -> ExecutorResult<Datum> {
    match op {
        UnaryOp::Not => val
            .not()
            .ok_or_else(|| ExecutorError::InvalidOperation("NOT requires boolean".to_string())),
        UnaryOp::Neg => val
            .negate()
            .ok_or_else(|| ExecutorError::InvalidOperation(format!("cannot negate {}", val))),
    }
}

/// Evaluate a scalar function
fn eval_function(name: &str, args: &[Datum]) -> ExecutorResult<Datum> {
    let name_upper = name.to_uppercase();
    match name_upper.as_str() {
        // String functions
        "UPPER" | "UCASE" => {
            if args.len() != 1 {
                return Err(ExecutorError::InvalidOperation(
                    "UPPER requires 1 argument".to_string(),
                ));
            }
            match &args[0] {
                Datum::String(s) => Ok(Datum::String(s.to_uppercase())),
                Datum::Null => Ok(Datum::Null),
                _ => Err(ExecutorError::InvalidOperation(
                    "UPPER requires string".to_string(),
                )),
            }
        }

        "LOWER" | "LCASE" => {
            if args.len() != 1 {
                return Err(ExecutorError::InvalidOperation(
                    "LOWER requires 1 argument".to_string(),
                ));
            }
            match &args[0] {
                Datum::String(s) => Ok(Datum::String(s.to_lowercase())),
                Datum::Null => Ok(Datum::Null),
                _ => Err(ExecutorError::InvalidOperation(
                    "LOWER requires string".to_string(),
                )),
            }
        }

        "LENGTH" | "LEN" => {
            if args.len() != 1 {
                return Err(ExecutorError::InvalidOperation(
                    "LENGTH requires 1 argument".to_string(),
                ));
            }
            match &args[0] {
                Datum::String(s) => Ok(Datum::Int(s.len() as i64)),
                Datum::Bytes(b) => Ok(Datum::Int(b.len() as i64)),
                Datum::Null => Ok(Datum::Null),
                _ => Err(ExecutorError::InvalidOperation(
                    "LENGTH requires string or bytes".to_string(),
                )),
            }
        }

        "CONCAT" => {
            let mut result = String::new();
            for arg in args {
                match arg {
                    Datum::String(s) => result.push_str(s),
                    Datum::Int(i) => result.push_str(&i.to_string()),
                    Datum::Float(f) => result.push_str(&f.to_string()),
                    Datum::Bool(b) => result.push_str(if *b { "true" } else { "false" }),
                    Datum::Null => return Ok(Datum::Null),
                    _ => {
                        return Err(ExecutorError::InvalidOperation(
                            "CONCAT: unsupported type".to_string(),
                        ))
                    }
                }
            }
            Ok(Datum::String(result))
        }

        "COALESCE" => {
            for arg in args {
                if !arg.is_null() {
                    return Ok(arg.clone());
                }
            }
            Ok(Datum::Null)
        }

        "NULLIF" => {
            if args.len() != 2 {
                return Err(ExecutorError::InvalidOperation(
                    "NULLIF requires 2 arguments".to_string(),
                ));
            }
            if args[0] == args[1] {
                Ok(Datum::Null)
            } else {
                Ok(args[0].clone())
            }
        }

        "ABS" => {
            if args.len() != 1 {
                return Err(ExecutorError::InvalidOperation(
                    "ABS requires 1 argument".to_string(),
                ));
            }
            match &args[0] {
                Datum::Int(i) => Ok(Datum::Int(i.abs())),
                Datum::Float(f) => Ok(Datum::Float(f.abs())),
                Datum::Null => Ok(Datum::Null),
                _ => Err(ExecutorError::InvalidOperation(
                    "ABS requires number".to_string(),
                )),
            }
        }

        _ if AggregateFunction::is_aggregate_name(&name_upper) => {
            Err(ExecutorError::InvalidOperation(format!(
                "aggregate function {} used outside of grouping",
                name
            )))
        }

        _ => Err(ExecutorError::InvalidOperation(format!(
            "unknown function: {}",
            name
        ))),
    }
}


/// Infer the output column of `expr` over `schema`.
///
/// A plain column reference keeps its descriptor (and table qualifier);
/// anything else is named by its SQL text.
pub fn column_info(expr: &Expr, schema: &Schema) -> ExecutorResult<ColumnInfo> {
    if let Expr::Column(name) = expr {
        if !name.is_wildcard() {
            let index = schema
                .column_index(name)?
                .ok_or_else(|| ExecutorError::ColumnNotFound(name.to_string()))?;
            return schema
                .column(index)
                .cloned()
                .ok_or_else(|| ExecutorError::ColumnNotFound(name.to_string()));
        }
    }
    Ok(ColumnInfo::new(expr.to_string(), None, infer_type(expr, schema)?))
}

fn infer_type(expr: &Expr, schema: &Schema) -> ExecutorResult<DataType> {
    match expr {
        Expr::Column(name) => {
            if name.is_wildcard() {
                return Ok(DataType::BigInt);
            }
            Ok(column_info(expr, schema)?.data_type)
        }
        Expr::Literal(value) => Ok(value.data_type().unwrap_or(DataType::Null)),
        Expr::BinaryOp { left, op, right } => {
            if !op.is_arithmetic() {
                return Ok(DataType::Boolean);
            }
            let lt = infer_type(left, schema)?;
            let rt = infer_type(right, schema)?;
            Ok(arithmetic_type(*op, &lt, &rt))
        }
        Expr::And(_)
        | Expr::Or(_)
        | Expr::IsNull { .. }
        | Expr::InList { .. }
        | Expr::Between { .. } => Ok(DataType::Boolean),
        Expr::UnaryOp { op, expr } => match op {
            UnaryOp::Not => Ok(DataType::Boolean),
            UnaryOp::Neg => infer_type(expr, schema),
        },
        Expr::Function { name, args, .. } => {
            let arg_types = args
                .iter()
                .map(|a| infer_type(a, schema))
                .collect::<ExecutorResult<Vec<_>>>()?;
            function_type(name, &arg_types)
        }
        Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists(_) => Err(unresolved(expr)),
    }
}

/// Subqueries are replaced by their results during planning
fn unresolved(expr: &Expr) -> ExecutorError {
    ExecutorError::InvalidPlan(format!("unresolved subquery: {}", expr))
}

fn arithmetic_type(op: BinaryOp, left: &DataType, right: &DataType) -> DataType {
    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (l, r) if l.is_integer() && r.is_integer() => DataType::BigInt,
        (l, r) if l.is_numeric() && r.is_numeric() => DataType::Double,
        (l, r) if op == BinaryOp::Add && l.is_string() && r.is_string() => DataType::Text,
        (l, _) => l.clone(),
    }
}

fn function_type(name: &str, args: &[DataType]) -> ExecutorResult<DataType> {
    let first = || args.first().cloned().unwrap_or(DataType::Null);
    match name.to_uppercase().as_str() {
        "UPPER" | "UCASE" | "LOWER" | "LCASE" | "CONCAT" => Ok(DataType::Text),
        "LENGTH" | "LEN" | "COUNT" => Ok(DataType::BigInt),
        "ABS" | "COALESCE" | "NULLIF" | "MIN" | "MAX" => Ok(first()),
        "SUM" => Ok(match first() {
            t if t.is_integer() => DataType::BigInt,
            DataType::Null => DataType::Null,
            _ => DataType::Double,
        }),
        "AVG" | "STDDEV" | "VARIANCE" => Ok(DataType::Double),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "unknown function: {}",
            name
        ))),
    }
}
