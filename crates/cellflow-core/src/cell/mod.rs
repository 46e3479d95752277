//! Cell-related types
//!
//! This module contains:
//! - [`CellError`] - Error values a formula can evaluate to
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A rectangle of cells (e.g., "A1:B10")
//! - [`RangeReference`] - A range with an optional sheet qualifier

mod address;
mod error;

pub use address::{CellAddress, CellRange, RangeReference};
pub use error::CellError;
