//! # cellflow-core
//!
//! Core value types shared by the cellflow formula compiler.
//!
//! This crate provides:
//! - [`CellError`] - Excel error values (`#DIV/0!`, `#NAME?`, ...)
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing
//! - [`RangeReference`] - A sheet-qualified range, as written in a formula
//!
//! ## Example
//!
//! ```rust
//! use cellflow_core::{CellRange, RangeReference};
//!
//! let reference = RangeReference::parse("Data!$A$1:B3").unwrap();
//! assert_eq!(reference.sheet.as_deref(), Some("Data"));
//! assert_eq!(reference.range, CellRange::parse("A1:B3").unwrap());
//! assert_eq!(reference.canonical(), "Data!A1:B3");
//! ```

pub mod cell;
pub mod error;

pub use cell::{CellAddress, CellError, CellRange, RangeReference};
pub use error::{Error, Result};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;
