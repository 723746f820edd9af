//! Jack Compiler - Common Types and Utilities
//!
//! This crate contains shared types and error definitions used across all
//! components of the Jack compiler: the segment and variable-kind vocabulary
//! and the compiler-wide error type.

pub mod error;
pub mod types;

pub use error::CompilerError;
pub use types::{ArithOp, Segment, VarKind};
