//! Text functions

use super::map_scalar;
use crate::error::FormulaResult;
use crate::value::FormulaValue;

/// LEN function (characters, not bytes)
pub fn fn_len(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(map_scalar(&args[0], &|v| {
        FormulaValue::Number(v.as_string().chars().count() as f64)
    }))
}

/// UPPER function
pub fn fn_upper(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(map_scalar(&args[0], &|v| {
        FormulaValue::String(v.as_string().to_uppercase())
    }))
}

/// LOWER function
pub fn fn_lower(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(map_scalar(&args[0], &|v| {
        FormulaValue::String(v.as_string().to_lowercase())
    }))
}

/// CONCATENATE function
pub fn fn_concatenate(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let mut out = String::new();
    for arg in args {
        if let Some(e) = arg.get_error() {
            return Ok(FormulaValue::Error(e));
        }
        out.push_str(&arg.as_string());
    }
    Ok(FormulaValue::String(out))
}
