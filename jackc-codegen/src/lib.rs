//! Jack Compiler - Lowering Backend
//!
//! This crate handles the final phase of compilation: turning textual
//! stack-machine (VM) instructions into Hack assembly. It includes:
//!
//! - The VM command model (parsed from already-emitted text, not tokens)
//! - The Hack instruction model
//! - The lowering engine (calling convention, segment addressing, labels)
//! - The one-time bootstrap sequence

pub mod bootstrap;
pub mod hack;
pub mod lower;
pub mod vm;

pub use bootstrap::bootstrap;
pub use hack::{Comp, Dest, HackInst, Jump};
pub use lower::{lower, translate_unit, LowerContext, LowerError};
pub use vm::VmCommand;

/// Render instructions as assembly text, one per line.
pub fn to_asm(instructions: &[HackInst]) -> String {
    let mut out = String::new();
    for inst in instructions {
        out.push_str(&inst.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_translation() {
        let mut ctx = LowerContext::new();
        let instructions = translate_unit("push constant 42", "Test", &mut ctx).unwrap();
        let asm = to_asm(&instructions);
        assert_eq!(asm, "@42\nD=A\n@SP\nA=M\nM=D\n@SP\nM=M+1\n");
    }
}
