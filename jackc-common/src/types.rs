//! Common types used throughout the compiler
//!
//! This module defines the vocabulary shared between the frontend and the
//! lowering backend: variable kinds, memory segments, and arithmetic
//! commands of the stack machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage kind of a Jack variable.
///
/// `Static` and `Field` live in class scope and persist for the class's
/// lifetime; `Arg` and `Var` live in subroutine scope and are cleared at the
/// start of every subroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    Static,
    Field,
    Arg,
    Var,
}

impl VarKind {
    /// The memory segment a variable of this kind is addressed through.
    pub fn segment(self) -> Segment {
        match self {
            VarKind::Static => Segment::Static,
            VarKind::Field => Segment::This,
            VarKind::Arg => Segment::Argument,
            VarKind::Var => Segment::Local,
        }
    }
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKind::Static => write!(f, "static"),
            VarKind::Field => write!(f, "field"),
            VarKind::Arg => write!(f, "arg"),
            VarKind::Var => write!(f, "var"),
        }
    }
}

/// The eight memory segments of the stack machine.
///
/// Each segment has its own addressing rule in the lowering pass: `Constant`
/// is a literal with no memory access, `Local`/`Argument`/`This`/`That` are
/// base-register + offset, `Temp` and `Pointer` sit at fixed bases 5 and 3,
/// and `Static` resolves to one address per (class, offset) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Constant,
    Local,
    Argument,
    This,
    That,
    Temp,
    Pointer,
    Static,
}

impl Segment {
    /// Classify a segment name from VM instruction text.
    pub fn from_str(s: &str) -> Option<Segment> {
        match s {
            "constant" => Some(Segment::Constant),
            "local" => Some(Segment::Local),
            "argument" => Some(Segment::Argument),
            "this" => Some(Segment::This),
            "that" => Some(Segment::That),
            "temp" => Some(Segment::Temp),
            "pointer" => Some(Segment::Pointer),
            "static" => Some(Segment::Static),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Constant => write!(f, "constant"),
            Segment::Local => write!(f, "local"),
            Segment::Argument => write!(f, "argument"),
            Segment::This => write!(f, "this"),
            Segment::That => write!(f, "that"),
            Segment::Temp => write!(f, "temp"),
            Segment::Pointer => write!(f, "pointer"),
            Segment::Static => write!(f, "static"),
        }
    }
}

/// Arithmetic and logical commands of the stack machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl ArithOp {
    /// Classify an arithmetic command name from VM instruction text.
    pub fn from_str(s: &str) -> Option<ArithOp> {
        match s {
            "add" => Some(ArithOp::Add),
            "sub" => Some(ArithOp::Sub),
            "neg" => Some(ArithOp::Neg),
            "eq" => Some(ArithOp::Eq),
            "gt" => Some(ArithOp::Gt),
            "lt" => Some(ArithOp::Lt),
            "and" => Some(ArithOp::And),
            "or" => Some(ArithOp::Or),
            "not" => Some(ArithOp::Not),
            _ => None,
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Add => write!(f, "add"),
            ArithOp::Sub => write!(f, "sub"),
            ArithOp::Neg => write!(f, "neg"),
            ArithOp::Eq => write!(f, "eq"),
            ArithOp::Gt => write!(f, "gt"),
            ArithOp::Lt => write!(f, "lt"),
            ArithOp::And => write!(f, "and"),
            ArithOp::Or => write!(f, "or"),
            ArithOp::Not => write!(f, "not"),
        }
    }
}
