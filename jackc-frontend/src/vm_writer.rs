//! VM instruction writer
//!
//! Typed emission surface for the textual stack-machine instruction stream.
//! The compiler never formats instruction text itself; everything goes
//! through here so the output vocabulary stays fixed.

use jackc_common::{ArithOp, Segment};

/// Accumulates emitted VM instructions, one per line.
#[derive(Debug, Default)]
pub struct VmWriter {
    out: String,
}

impl VmWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: Segment, index: u16) {
        self.out.push_str(&format!("push {segment} {index}\n"));
    }

    pub fn pop(&mut self, segment: Segment, index: u16) {
        self.out.push_str(&format!("pop {segment} {index}\n"));
    }

    pub fn arith(&mut self, op: ArithOp) {
        self.out.push_str(&format!("{op}\n"));
    }

    pub fn label(&mut self, label: &str) {
        self.out.push_str(&format!("label {label}\n"));
    }

    pub fn goto(&mut self, label: &str) {
        self.out.push_str(&format!("goto {label}\n"));
    }

    pub fn if_goto(&mut self, label: &str) {
        self.out.push_str(&format!("if-goto {label}\n"));
    }

    pub fn function(&mut self, class: &str, subroutine: &str, n_locals: u16) {
        self.out
            .push_str(&format!("function {class}.{subroutine} {n_locals}\n"));
    }

    pub fn call(&mut self, name: &str, n_args: u16) {
        self.out.push_str(&format!("call {name} {n_args}\n"));
    }

    pub fn ret(&mut self) {
        self.out.push_str("return\n");
    }

    /// The finished instruction stream.
    pub fn into_output(self) -> String {
        self.out
    }
}
