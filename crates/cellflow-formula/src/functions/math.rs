//! Math functions

use super::{collect_numbers, map_scalar, number_arg};
use crate::error::FormulaResult;
use crate::value::FormulaValue;
use cellflow_core::CellError;

fn number_or_error(result: Result<f64, CellError>) -> FormulaValue {
    match result {
        Ok(n) if n.is_finite() => FormulaValue::Number(n),
        Ok(_) => FormulaValue::Error(CellError::Num),
        Err(e) => FormulaValue::Error(e),
    }
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(number_or_error(
        collect_numbers(args).map(|ns| ns.iter().sum()),
    ))
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(number_or_error(collect_numbers(args).and_then(|ns| {
        if ns.is_empty() {
            Err(CellError::Div0)
        } else {
            Ok(ns.iter().sum::<f64>() / ns.len() as f64)
        }
    })))
}

/// MIN function; zero when no numbers are given
pub fn fn_min(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(number_or_error(collect_numbers(args).map(|ns| {
        ns.into_iter().reduce(f64::min).unwrap_or(0.0)
    })))
}

/// MAX function; zero when no numbers are given
pub fn fn_max(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(number_or_error(collect_numbers(args).map(|ns| {
        ns.into_iter().reduce(f64::max).unwrap_or(0.0)
    })))
}

/// COUNT function: counts numbers, errors are skipped rather than raised
pub fn fn_count(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .map(|arg| match arg {
            FormulaValue::Number(_) => 1,
            FormulaValue::Array(rows) => rows
                .iter()
                .flatten()
                .filter(|c| matches!(c, FormulaValue::Number(_)))
                .count(),
            _ => 0,
        })
        .sum::<usize>();
    Ok(FormulaValue::Number(count as f64))
}

/// ABS function
pub fn fn_abs(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(map_scalar(&args[0], &|v| {
        number_or_error(number_arg(v).map(f64::abs))
    }))
}

/// ROUND function (half away from zero)
pub fn fn_round(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let digits = match number_arg(&args[1]) {
        // Past f64's exponent range every count rounds the same way
        Ok(d) => d.trunc().clamp(-308.0, 308.0) as i32,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let factor = 10f64.powi(digits.abs());
    Ok(map_scalar(&args[0], &|v| {
        number_or_error(number_arg(v).map(|n| {
            if digits >= 0 {
                let scaled = n * factor;
                if scaled.is_finite() {
                    scaled.round() / factor
                } else {
                    n
                }
            } else {
                (n / factor).round() * factor
            }
        }))
    }))
}

/// MOD function; the result takes the sign of the divisor
pub fn fn_mod(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let result = number_arg(&args[0]).and_then(|n| {
        let d = number_arg(&args[1])?;
        if d == 0.0 {
            return Err(CellError::Div0);
        }
        Ok(n - d * (n / d).floor())
    });
    Ok(number_or_error(result))
}

/// POWER function
pub fn fn_power(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let result = number_arg(&args[0]).and_then(|base| {
        let exp = number_arg(&args[1])?;
        if base == 0.0 && exp < 0.0 {
            return Err(CellError::Div0);
        }
        Ok(base.powf(exp))
    });
    Ok(number_or_error(result))
}

/// SQRT function
pub fn fn_sqrt(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(map_scalar(&args[0], &|v| {
        number_or_error(number_arg(v).and_then(|n| {
            if n < 0.0 {
                Err(CellError::Num)
            } else {
                Ok(n.sqrt())
            }
        }))
    }))
}

/// PI function
pub fn fn_pi(_args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}
