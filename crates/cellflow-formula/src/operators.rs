//! Operator bodies
//!
//! Scalars follow Excel coercion rules; arrays are combined element-wise.

use crate::error::{FormulaError, FormulaResult};
use crate::token::{BinaryOperator, UnaryOperator};
use crate::value::FormulaValue;
use cellflow_core::CellError;
use std::cmp::Ordering;

/// Apply a binary operator to two evaluated operands
pub fn apply_binary(
    op: BinaryOperator,
    left: &FormulaValue,
    right: &FormulaValue,
) -> FormulaResult<FormulaValue> {
    reject_names(left)?;
    reject_names(right)?;
    Ok(broadcast(left, right, &|l, r| binary_scalar(op, l, r)))
}

/// Apply a unary operator to an evaluated operand
pub fn apply_unary(op: UnaryOperator, operand: &FormulaValue) -> FormulaResult<FormulaValue> {
    reject_names(operand)?;
    Ok(map_cells(operand, &|v| unary_scalar(op, v)))
}

fn reject_names(value: &FormulaValue) -> FormulaResult<()> {
    match value {
        FormulaValue::Names(_) => Err(FormulaError::Evaluation(
            "name table used as an operand".into(),
        )),
        _ => Ok(()),
    }
}

fn map_cells(value: &FormulaValue, f: &dyn Fn(&FormulaValue) -> FormulaValue) -> FormulaValue {
    match value {
        FormulaValue::Array(rows) => FormulaValue::Array(
            rows.iter()
                .map(|row| row.iter().map(f).collect())
                .collect(),
        ),
        scalar => f(scalar),
    }
}

fn shape(rows: &[Vec<FormulaValue>]) -> (usize, usize) {
    (rows.len(), rows.first().map_or(0, Vec::len))
}

fn broadcast(
    left: &FormulaValue,
    right: &FormulaValue,
    f: &dyn Fn(&FormulaValue, &FormulaValue) -> FormulaValue,
) -> FormulaValue {
    match (left, right) {
        (FormulaValue::Array(l), FormulaValue::Array(r)) => {
            if shape(l) == shape(r) {
                FormulaValue::Array(
                    l.iter()
                        .zip(r)
                        .map(|(lrow, rrow)| lrow.iter().zip(rrow).map(|(a, b)| f(a, b)).collect())
                        .collect(),
                )
            } else if shape(l) == (1, 1) {
                map_cells(right, &|b| f(&l[0][0], b))
            } else if shape(r) == (1, 1) {
                map_cells(left, &|a| f(a, &r[0][0]))
            } else {
                FormulaValue::Error(CellError::Value)
            }
        }
        (FormulaValue::Array(_), scalar) => map_cells(left, &|a| f(a, scalar)),
        (scalar, FormulaValue::Array(_)) => map_cells(right, &|b| f(scalar, b)),
        (l, r) => f(l, r),
    }
}

fn binary_scalar(op: BinaryOperator, left: &FormulaValue, right: &FormulaValue) -> FormulaValue {
    // Errors propagate, left operand first
    if let Some(e) = left.get_error().or_else(|| right.get_error()) {
        return FormulaValue::Error(e);
    }

    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Power => {
            let (Some(l), Some(r)) = (left.as_number(), right.as_number()) else {
                return FormulaValue::Error(CellError::Value);
            };
            arithmetic(op, l, r)
        }
        BinaryOperator::Concat => {
            FormulaValue::String(left.as_string() + &right.as_string())
        }
        BinaryOperator::Equal => FormulaValue::Boolean(compare_values(left, right).is_eq()),
        BinaryOperator::NotEqual => FormulaValue::Boolean(compare_values(left, right).is_ne()),
        BinaryOperator::LessThan => FormulaValue::Boolean(compare_values(left, right).is_lt()),
        BinaryOperator::LessEqual => FormulaValue::Boolean(compare_values(left, right).is_le()),
        BinaryOperator::GreaterThan => FormulaValue::Boolean(compare_values(left, right).is_gt()),
        BinaryOperator::GreaterEqual => {
            FormulaValue::Boolean(compare_values(left, right).is_ge())
        }
    }
}

fn arithmetic(op: BinaryOperator, l: f64, r: f64) -> FormulaValue {
    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return FormulaValue::Error(CellError::Div0);
            }
            l / r
        }
        BinaryOperator::Power => {
            if l == 0.0 && r < 0.0 {
                return FormulaValue::Error(CellError::Div0);
            }
            l.powf(r)
        }
        _ => unreachable!("not an arithmetic operator: {:?}", op),
    };

    if result.is_finite() {
        FormulaValue::Number(result)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

fn unary_scalar(op: UnaryOperator, value: &FormulaValue) -> FormulaValue {
    if let Some(e) = value.get_error() {
        return FormulaValue::Error(e);
    }
    let Some(n) = value.as_number() else {
        return FormulaValue::Error(CellError::Value);
    };
    match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    }
}

/// Compare two scalars the way Excel orders them
///
/// Empty counts as zero. Numbers sort before text, text before booleans,
/// and text compares case-insensitively.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) | FormulaValue::Empty => 0,
            FormulaValue::String(_) => 1,
            FormulaValue::Boolean(_) => 2,
            FormulaValue::Error(_) => 3,
            FormulaValue::Array(_) | FormulaValue::Names(_) => 4,
        }
    }

    match (left, right) {
        (FormulaValue::String(l), FormulaValue::String(r)) => {
            l.to_lowercase().cmp(&r.to_lowercase())
        }
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => l.cmp(r),
        (FormulaValue::Error(l), FormulaValue::Error(r)) => l.code().cmp(&r.code()),
        (l, r) if rank(l) == 0 && rank(r) == 0 => {
            let l = l.as_number().unwrap_or(0.0);
            let r = r.as_number().unwrap_or(0.0);
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        (l, r) => rank(l).cmp(&rank(r)),
    }
}
