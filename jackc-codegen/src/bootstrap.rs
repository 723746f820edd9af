//! Bootstrap sequence
//!
//! Emitted exactly once per whole program, ahead of any translated unit:
//! initializes the stack pointer to the stack origin, lays down the three
//! shared comparison subroutines, and calls the program's entry subroutine
//! `Sys.init` through the regular calling convention. Control jumps over
//! the subroutine bodies; they are entered only by explicit dispatch from a
//! lowered comparison.

use crate::hack::{Comp, Dest, HackInst, Jump, R13, R14, SP, STACK_ORIGIN};
use crate::lower::{emit_call, Emitter, LowerContext, CMP_EQ, CMP_GT, CMP_LT, CMP_RET};

const BOOT: &str = "$BOOT";
const ENTRY: &str = "Sys.init";

/// One comparison subroutine: reads the operand difference from R13, leaves
/// the -1/0 sentinel in D, and continues at the shared epilogue.
fn comparison_subroutine(e: &mut Emitter<'_>, name: &str, jump: Jump) {
    let true_label = format!("{name}.TRUE");
    e.label(name);
    e.at(R13);
    e.assign(Dest::D, Comp::M);
    e.at(&true_label);
    e.branch(Comp::D, jump);
    e.assign(Dest::D, Comp::Zero);
    e.jump_to(CMP_RET);
    e.label(&true_label);
    e.assign(Dest::D, Comp::NegOne);
    e.jump_to(CMP_RET);
}

/// The one-time global prologue. Draws the entry call's return id from the
/// program-wide allocator in `ctx`, like every other call.
pub fn bootstrap(ctx: &mut LowerContext) -> Vec<HackInst> {
    let mut e = Emitter::new(ctx);
    // SP = stack origin
    e.at_const(STACK_ORIGIN);
    e.assign(Dest::D, Comp::A);
    e.at(SP);
    e.assign(Dest::M, Comp::D);
    e.jump_to(BOOT);

    comparison_subroutine(&mut e, CMP_EQ, Jump::JEQ);
    comparison_subroutine(&mut e, CMP_GT, Jump::JGT);
    comparison_subroutine(&mut e, CMP_LT, Jump::JLT);

    // shared epilogue: push the sentinel, jump back through the saved
    // return address
    e.label(CMP_RET);
    e.push_d();
    e.at(R14);
    e.assign(Dest::A, Comp::M);
    e.branch(Comp::Zero, Jump::JMP);

    e.label(BOOT);
    emit_call(&mut e, ENTRY, 0);
    e.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_asm;
    use crate::lower::translate_unit;

    #[test]
    fn test_bootstrap_shape() {
        let mut ctx = LowerContext::new();
        let asm = to_asm(&bootstrap(&mut ctx));
        assert!(asm.starts_with("@256\nD=A\n@SP\nM=D\n@$BOOT\n0;JMP\n"));
        // each comparison subroutine appears exactly once
        for label in ["($CMP.EQ)", "($CMP.GT)", "($CMP.LT)", "($CMP.RET)"] {
            assert_eq!(asm.matches(label).count(), 1);
        }
        assert!(asm.contains("($BOOT)\n@$RET.0\n"));
        assert!(asm.contains("@Sys.init\n0;JMP\n"));
    }

    #[test]
    fn test_bootstrap_shares_the_return_id_allocator() {
        let mut ctx = LowerContext::new();
        let boot = to_asm(&bootstrap(&mut ctx));
        assert!(boot.contains("($RET.0)"));
        let unit = to_asm(&translate_unit("call Main.main 0", "Main", &mut ctx).unwrap());
        assert!(unit.contains("($RET.1)"));
    }
}
