//! Logical functions

use crate::error::FormulaResult;
use crate::value::FormulaValue;
use cellflow_core::CellError;

/// Truth values an AND/OR sees, or the error to return instead
fn collect_bools(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Error(e) => return Err(*e),
                        FormulaValue::Boolean(b) => values.push(*b),
                        FormulaValue::Number(n) => values.push(*n != 0.0),
                        _ => {}
                    }
                }
            }
            FormulaValue::String(_) => return Err(CellError::Value),
            other => {
                if let Some(b) = other.as_bool() {
                    values.push(b);
                }
            }
        }
    }
    if values.is_empty() {
        Err(CellError::Value)
    } else {
        Ok(values)
    }
}

/// IF function
pub fn fn_if(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let condition = &args[0];
    if let Some(e) = condition.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    match condition.as_bool() {
        Some(true) => Ok(args[1].clone()),
        Some(false) => Ok(args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false))),
        None => Ok(FormulaValue::Error(CellError::Value)),
    }
}

/// AND function
pub fn fn_and(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(match collect_bools(args) {
        Ok(values) => FormulaValue::Boolean(values.into_iter().all(|b| b)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// OR function
pub fn fn_or(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(match collect_bools(args) {
        Ok(values) => FormulaValue::Boolean(values.into_iter().any(|b| b)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// NOT function
pub fn fn_not(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    if let Some(e) = args[0].get_error() {
        return Ok(FormulaValue::Error(e));
    }
    Ok(match args[0].as_bool() {
        Some(b) => FormulaValue::Boolean(!b),
        None => FormulaValue::Error(CellError::Value),
    })
}

/// IFERROR function
pub fn fn_iferror(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    if args[0].is_error() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_if() {
        let yes: FormulaValue = "yes".into();
        let no: FormulaValue = "no".into();
        assert_eq!(fn_if(&[true.into(), yes.clone(), no.clone()]).unwrap(), yes);
        assert_eq!(fn_if(&[0.0.into(), yes.clone(), no.clone()]).unwrap(), no);
        assert_eq!(fn_if(&[false.into(), yes.clone()]).unwrap(), FormulaValue::Boolean(false));
        assert_eq!(
            fn_if(&["maybe".into(), yes, no]).unwrap(),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_and_or_not() {
        assert_eq!(fn_and(&[true.into(), 1.0.into()]).unwrap(), FormulaValue::Boolean(true));
        assert_eq!(fn_and(&[true.into(), false.into()]).unwrap(), FormulaValue::Boolean(false));
        assert_eq!(fn_or(&[false.into(), 2.0.into()]).unwrap(), FormulaValue::Boolean(true));
        assert_eq!(fn_not(&[true.into()]).unwrap(), FormulaValue::Boolean(false));
        assert_eq!(
            fn_and(&[CellError::Na.into()]).unwrap(),
            FormulaValue::Error(CellError::Na)
        );
    }

    #[test]
    fn test_iferror() {
        assert_eq!(
            fn_iferror(&[CellError::Div0.into(), 0.0.into()]).unwrap(),
            FormulaValue::Number(0.0)
        );
        assert_eq!(
            fn_iferror(&[5.0.into(), 0.0.into()]).unwrap(),
            FormulaValue::Number(5.0)
        );
    }
}
