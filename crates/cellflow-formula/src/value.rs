//! Values flowing through a formula graph

use ahash::AHashMap;
use cellflow_core::CellError;
use std::fmt;
use std::sync::Arc;

/// Value held by a graph node
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Rows of values; a range reference evaluates to one of these
    Array(Vec<Vec<FormulaValue>>),
    Empty,
    /// The defined-name table, fed to the reference batch node
    Names(NameEnvironment),
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            FormulaValue::Array(rows) => match rows.as_slice() {
                [row] if row.len() == 1 => row[0].as_number(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) => match s.to_uppercase().as_str() {
                "TRUE" => Some(true),
                "FALSE" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert to text the way `&` and text functions see it
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) | FormulaValue::Names(_) => CellError::Value.to_string(),
        }
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Canonical result shape: a 1x1 array collapses to its only element
    ///
    /// A name table is never a valid formula result and becomes `#VALUE!`.
    pub fn normalize(self) -> FormulaValue {
        match self {
            FormulaValue::Array(mut rows) if rows.len() == 1 && rows[0].len() == 1 => {
                rows.swap_remove(0).swap_remove(0).normalize()
            }
            FormulaValue::Names(_) => FormulaValue::Error(CellError::Value),
            other => other,
        }
    }

    /// Text a literal of this value is written as in a formula
    pub fn literal_text(&self) -> String {
        match self {
            FormulaValue::String(s) => format!("\"{}\"", s.replace('"', "\"\"")),
            FormulaValue::Array(rows) => {
                let rows: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(FormulaValue::literal_text)
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .collect();
                format!("{{{}}}", rows.join(";"))
            }
            FormulaValue::Empty => "<empty>".to_string(),
            FormulaValue::Names(_) => "<names>".to_string(),
            other => other.as_string(),
        }
    }
}

/// Format like Excel: integral values print without a fraction
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<i32> for FormulaValue {
    fn from(n: i32) -> Self {
        FormulaValue::Number(n as f64)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::String(s.to_string())
    }
}

impl From<CellError> for FormulaValue {
    fn from(e: CellError) -> Self {
        FormulaValue::Error(e)
    }
}

impl From<NameEnvironment> for FormulaValue {
    fn from(names: NameEnvironment) -> Self {
        FormulaValue::Names(names)
    }
}

/// Immutable table of defined names, shared between pipeline calls
///
/// Names are case-insensitive; lookups of undefined names give `#NAME?`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameEnvironment {
    names: Arc<AHashMap<String, FormulaValue>>,
}

impl NameEnvironment {
    pub fn builder() -> NameEnvironmentBuilder {
        NameEnvironmentBuilder::default()
    }

    /// Value of a defined name
    pub fn resolve(&self, name: &str) -> FormulaValue {
        self.names
            .get(&name.to_uppercase())
            .cloned()
            .unwrap_or(FormulaValue::Error(CellError::Name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(&name.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, FormulaValue)> for NameEnvironment {
    fn from_iter<I: IntoIterator<Item = (S, FormulaValue)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(NameEnvironment::builder(), |b, (name, value)| {
                b.define(name, value)
            })
            .build()
    }
}

/// Collects definitions for a [`NameEnvironment`]
#[derive(Debug, Default)]
pub struct NameEnvironmentBuilder {
    names: AHashMap<String, FormulaValue>,
}

impl NameEnvironmentBuilder {
    /// Define (or redefine) a name
    pub fn define(mut self, name: impl AsRef<str>, value: impl Into<FormulaValue>) -> Self {
        self.names
            .insert(name.as_ref().to_uppercase(), value.into());
        self
    }

    pub fn build(self) -> NameEnvironment {
        NameEnvironment {
            names: Arc::new(self.names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_coercions() {
        assert_eq!(FormulaValue::Boolean(true).as_number(), Some(1.0));
        assert_eq!(FormulaValue::String(" 2.5 ".into()).as_number(), Some(2.5));
        assert_eq!(FormulaValue::Empty.as_number(), Some(0.0));
        assert_eq!(FormulaValue::Error(CellError::Na).as_number(), None);
        assert_eq!(FormulaValue::String("false".into()).as_bool(), Some(false));
        assert_eq!(FormulaValue::Number(3.0).as_string(), "3");
        assert_eq!(FormulaValue::Number(0.25).as_string(), "0.25");
    }

    #[test]
    fn test_normalize_collapses_single_cell_arrays() {
        let single = FormulaValue::Array(vec![vec![FormulaValue::Number(7.0)]]);
        assert_eq!(single.normalize(), FormulaValue::Number(7.0));

        let wide = FormulaValue::Array(vec![vec![1.0.into(), 2.0.into()]]);
        assert_eq!(wide.clone().normalize(), wide);

        let names = FormulaValue::Names(NameEnvironment::default());
        assert_eq!(names.normalize(), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(FormulaValue::from("say \"hi\"").literal_text(), "\"say \"\"hi\"\"\"");
        assert_eq!(FormulaValue::Boolean(true).literal_text(), "TRUE");
        assert_eq!(FormulaValue::Error(CellError::Na).literal_text(), "#N/A");
        let arr = FormulaValue::Array(vec![vec![1.0.into(), 2.0.into()], vec![3.0.into(), 4.0.into()]]);
        assert_eq!(arr.literal_text(), "{1,2;3,4}");
    }

    #[test]
    fn test_name_environment_is_case_insensitive() {
        let env = NameEnvironment::builder()
            .define("TaxRate", 0.2)
            .define("label", "net")
            .build();
        assert_eq!(env.len(), 2);
        assert!(env.contains("TAXRATE"));
        assert_eq!(env.resolve("taxrate"), FormulaValue::Number(0.2));
        assert_eq!(env.resolve("missing"), FormulaValue::Error(CellError::Name));
    }
}
