//! Postfix token model
//!
//! A formula arrives as a postfix stream of [`Token`]s. Each token knows how
//! many stacked values it consumes, the text it stands for once its arguments
//! are known, and how to turn itself into a graph node.

use crate::dispatcher::NodeFunction;
use crate::error::{FormulaError, FormulaResult};
use crate::functions::registry;
use crate::operators;
use crate::value::FormulaValue;
use cellflow_core::{CellAddress, RangeReference};
use lazy_regex::regex_is_match;
use std::fmt;
use std::sync::Arc;

/// One unit of a parsed formula
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Operand(Operand),
    Operator(Operator),
    Function(Function),
}

/// A leaf: literal value, cell/range reference, or defined name
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(FormulaValue),
    /// Cell or range; becomes a pipeline input named by its A1 text
    Range(RangeReference),
    /// Defined name; resolved through the name table in one batch
    Name(String),
}

/// Built-in operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Binary(BinaryOperator),
    Unary(UnaryOperator),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Prefix `-`
    Negate,
    /// Postfix `%`
    Percent,
}

/// A function call with a fixed number of arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    name: String,
    n_args: usize,
}

impl Token {
    /// Literal operand
    pub fn literal(value: impl Into<FormulaValue>) -> Self {
        Token::Operand(Operand::Literal(value.into()))
    }

    /// Cell or range operand, e.g. `A1`, `Sheet1!B2:C9`
    pub fn range(text: &str) -> FormulaResult<Self> {
        Ok(Token::Operand(Operand::Range(RangeReference::parse(text)?)))
    }

    /// Defined-name operand
    pub fn name(name: &str) -> FormulaResult<Self> {
        let is_name = regex_is_match!(r"^[A-Za-z_\\][A-Za-z0-9_.\\]*$", name);
        let is_keyword = matches!(name.to_uppercase().as_str(), "TRUE" | "FALSE");
        if !is_name || is_keyword || CellAddress::parse(name).is_ok() {
            return Err(FormulaError::InvalidReference(format!(
                "'{}' is not a valid name",
                name
            )));
        }
        Ok(Token::Operand(Operand::Name(name.to_uppercase())))
    }

    pub fn binary(op: BinaryOperator) -> Self {
        Token::Operator(Operator::Binary(op))
    }

    pub fn unary(op: UnaryOperator) -> Self {
        Token::Operator(Operator::Unary(op))
    }

    /// Function call consuming `n_args` stacked values
    pub fn function(name: &str, n_args: usize) -> Self {
        Token::Function(Function {
            name: name.to_uppercase(),
            n_args,
        })
    }

    /// Number of stacked values this token consumes
    pub fn arity(&self) -> usize {
        match self {
            Token::Operand(_) => 0,
            Token::Operator(Operator::Binary(_)) => 2,
            Token::Operator(Operator::Unary(_)) => 1,
            Token::Function(f) => f.n_args,
        }
    }

    /// Whether this leaf is resolved through the name table
    pub fn is_reference(&self) -> bool {
        matches!(self, Token::Operand(Operand::Name(_)))
    }

    /// Derived id: the text this token stands for given its argument texts
    ///
    /// Identical subexpressions produce identical text. Operator results are
    /// parenthesised so that nesting stays unambiguous.
    pub fn expression(&self, args: &[&str]) -> String {
        match self {
            Token::Operand(operand) => operand.expression(),
            Token::Operator(Operator::Binary(op)) => {
                format!("({} {} {})", args[0], op.symbol(), args[1])
            }
            Token::Operator(Operator::Unary(UnaryOperator::Negate)) => format!("(-{})", args[0]),
            Token::Operator(Operator::Unary(UnaryOperator::Percent)) => format!("({}%)", args[0]),
            Token::Function(f) => format!("{}({})", f.name, args.join(", ")),
        }
    }

    /// Short label used in diagnostics and as the seed of function node ids
    pub fn label(&self) -> String {
        match self {
            Token::Operand(operand) => operand.expression(),
            Token::Operator(Operator::Binary(op)) => op.symbol().to_string(),
            Token::Operator(Operator::Unary(UnaryOperator::Negate)) => "u-".to_string(),
            Token::Operator(Operator::Unary(UnaryOperator::Percent)) => "%".to_string(),
            Token::Function(f) => f.name.clone(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Operand {
    /// Canonical text of the leaf
    pub fn expression(&self) -> String {
        match self {
            Operand::Literal(value) => value.literal_text(),
            Operand::Range(reference) => reference.canonical(),
            Operand::Name(name) => name.clone(),
        }
    }

    /// Literal value, if the leaf carries one
    pub fn compile(&self) -> Option<FormulaValue> {
        match self {
            Operand::Literal(value) => Some(value.clone()),
            Operand::Range(_) | Operand::Name(_) => None,
        }
    }
}

impl Operator {
    /// Callable computing this operator from its argument values
    pub fn compile(&self) -> NodeFunction {
        let op = *self;
        Arc::new(move |args: &[FormulaValue]| -> FormulaResult<Vec<FormulaValue>> {
            let value = match op {
                Operator::Binary(bin) => operators::apply_binary(bin, &args[0], &args[1])?,
                Operator::Unary(un) => operators::apply_unary(un, &args[0])?,
            };
            Ok(vec![value])
        })
    }
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_args(&self) -> usize {
        self.n_args
    }

    /// Look the function up and check its argument count
    pub fn compile(&self) -> FormulaResult<NodeFunction> {
        let def = registry()
            .get(&self.name)
            .ok_or_else(|| FormulaError::UnknownFunction(self.name.clone()))?;

        let too_few = self.n_args < def.min_args;
        let too_many = def.max_args.is_some_and(|max| self.n_args > max);
        if too_few || too_many {
            let expected = match def.max_args {
                Some(max) if max == def.min_args => max.to_string(),
                Some(max) => format!("{}..={}", def.min_args, max),
                None => format!("at least {}", def.min_args),
            };
            return Err(FormulaError::ArgumentCount {
                function: self.name.clone(),
                expected,
                actual: self.n_args,
            });
        }

        let implementation = def.implementation;
        Ok(Arc::new(
            move |args: &[FormulaValue]| -> FormulaResult<Vec<FormulaValue>> {
                Ok(vec![implementation(args)?])
            },
        ))
    }
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
        }
    }
}
