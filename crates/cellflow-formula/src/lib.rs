//! # cellflow-formula
//!
//! Compiles one formula, given as a postfix token stream, into a folded
//! dataflow pipeline.
//!
//! This crate provides:
//! - The token model ([`Token`]) and the values flowing between nodes
//!   ([`FormulaValue`])
//! - A synchronous dataflow engine ([`Dispatcher`])
//! - The stack-driven [`GraphBuilder`], which shares repeated subexpressions,
//!   registers leaves lazily and resolves defined names in one batch
//! - [`CompiledPipeline`], the callable result with constants folded away
//!
//! ## Example
//!
//! ```rust
//! use cellflow_formula::{BinaryOperator, FormulaValue, GraphBuilder, Token};
//!
//! let mut builder = GraphBuilder::new();
//! builder.append(Token::range("A1")?)?;
//! builder.append(Token::literal(10.0))?;
//! builder.append(Token::binary(BinaryOperator::Add))?;
//! builder.finish()?;
//!
//! let pipeline = builder.compile()?;
//! assert_eq!(pipeline.inputs()[0].as_str(), "A1");
//! assert_eq!(pipeline.call(&[FormulaValue::Number(5.0)])?, FormulaValue::Number(15.0));
//! # Ok::<(), cellflow_formula::FormulaError>(())
//! ```

pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod functions;
pub mod operators;
pub mod pipeline;
pub mod references;
pub mod settings;
pub mod token;
pub mod value;

pub use builder::{compile_tokens, GraphBuilder, TokenKey, TokenState};
pub use dispatcher::{Dispatcher, FunctionKind, NodeId, Solution};
pub use error::{FormulaError, FormulaResult};
pub use pipeline::CompiledPipeline;
pub use references::ReferenceBatch;
pub use settings::{BuilderSettings, NAME_REFERENCES};
pub use token::{BinaryOperator, Function, Operand, Operator, Token, UnaryOperator};
pub use value::{FormulaValue, NameEnvironment};
