//! Built-in functions
//!
//! Function tokens compile to one of the entries registered here.

pub mod logical;
pub mod math;
pub mod text;

use crate::error::FormulaResult;
use crate::value::FormulaValue;
use ahash::AHashMap;
use cellflow_core::CellError;
use once_cell::sync::Lazy;

/// Function implementation signature
pub type FunctionImpl = fn(&[FormulaValue]) -> FormulaResult<FormulaValue>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// The shared, read-only registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}

impl FunctionRegistry {
    /// Create a registry holding every built-in function
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        // Math
        registry.register("SUM", 1, None, math::fn_sum);
        registry.register("AVERAGE", 1, None, math::fn_average);
        registry.register("MIN", 1, None, math::fn_min);
        registry.register("MAX", 1, None, math::fn_max);
        registry.register("COUNT", 1, None, math::fn_count);
        registry.register("ABS", 1, Some(1), math::fn_abs);
        registry.register("ROUND", 2, Some(2), math::fn_round);
        registry.register("MOD", 2, Some(2), math::fn_mod);
        registry.register("POWER", 2, Some(2), math::fn_power);
        registry.register("SQRT", 1, Some(1), math::fn_sqrt);
        registry.register("PI", 0, Some(0), math::fn_pi);

        // Logical
        registry.register("IF", 2, Some(3), logical::fn_if);
        registry.register("AND", 1, None, logical::fn_and);
        registry.register("OR", 1, None, logical::fn_or);
        registry.register("NOT", 1, Some(1), logical::fn_not);
        registry.register("IFERROR", 2, Some(2), logical::fn_iferror);

        // Text
        registry.register("LEN", 1, Some(1), text::fn_len);
        registry.register("UPPER", 1, Some(1), text::fn_upper);
        registry.register("LOWER", 1, Some(1), text::fn_lower);
        registry.register("CONCATENATE", 1, None, text::fn_concatenate);

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_uppercase().as_str())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.functions.insert(
            name,
            FunctionDef {
                name,
                min_args,
                max_args,
                implementation,
            },
        );
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Numbers an aggregate sees: direct numbers/booleans and the numbers inside arrays
///
/// The first error encountered wins.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Number(n) => numbers.push(*n),
            FormulaValue::Boolean(b) => numbers.push(if *b { 1.0 } else { 0.0 }),
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(numbers)
}

/// Apply a scalar function to a value, element-wise over arrays
pub(crate) fn map_scalar(
    value: &FormulaValue,
    f: &dyn Fn(&FormulaValue) -> FormulaValue,
) -> FormulaValue {
    match value {
        FormulaValue::Array(rows) => FormulaValue::Array(
            rows.iter()
                .map(|row| row.iter().map(|cell| map_scalar(cell, f)).collect())
                .collect(),
        ),
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        scalar => f(scalar),
    }
}

/// Numeric view of a scalar argument, or the error value to return instead
pub(crate) fn number_arg(value: &FormulaValue) -> Result<f64, CellError> {
    if let Some(e) = value.get_error() {
        return Err(e);
    }
    value.as_number().ok_or(CellError::Value)
}
