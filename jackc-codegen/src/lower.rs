//! Lowering engine
//!
//! Pure translation from one parsed VM command plus a running context to a
//! sequence of Hack instructions. The context is an explicit record — the
//! owning class (for `static` addressing), the current function name (for
//! label qualification) and one global id allocator for synthesized return
//! addresses — threaded through every call; there is no module-level
//! mutable state, and a fresh context makes a compilation run hermetic.
//!
//! The target machine has no call instruction and no frame pointer, so the
//! calling convention and the comparison subroutine dispatch are implemented
//! entirely in software here.

use crate::hack::{Comp, Dest, HackInst, Jump, ARG, LCL, POINTER_BASE, R13, R14, SP, TEMP_BASE, THAT, THIS};
use crate::vm::{self, VmCommand};
use jackc_common::{ArithOp, Segment};
use thiserror::Error;

/// Entry labels of the three shared comparison subroutines.
pub(crate) const CMP_EQ: &str = "$CMP.EQ";
pub(crate) const CMP_GT: &str = "$CMP.GT";
pub(crate) const CMP_LT: &str = "$CMP.LT";
/// Shared comparison epilogue: pushes the sentinel in D and jumps back
/// through the return address saved in R14.
pub(crate) const CMP_RET: &str = "$CMP.RET";

/// Errors of the lowering phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    #[error("unknown VM instruction: {0}")]
    UnknownCommand(String),

    #[error("cannot pop to the constant segment")]
    PopConstant,

    #[error("{segment} index {index} out of range")]
    IndexOutOfRange { segment: Segment, index: u16 },
}

/// Allocator for globally unique synthesized return-address ids. Ids are
/// monotonically increasing and never repeat within one compiled program,
/// even across source files.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Running context for lowering one whole program.
#[derive(Debug, Default)]
pub struct LowerContext {
    class: String,
    function: String,
    ids: IdAllocator,
}

impl LowerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new translation unit. `static` addressing resolves to one
    /// address per (class, offset), so the class name must be set before
    /// any of the unit's commands are lowered.
    pub fn start_class(&mut self, class: &str) {
        self.class = class.to_string();
    }
}

pub(crate) struct Emitter<'a> {
    pub(crate) out: Vec<HackInst>,
    pub(crate) ctx: &'a mut LowerContext,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(ctx: &'a mut LowerContext) -> Self {
        Self {
            out: Vec::new(),
            ctx,
        }
    }

    pub(crate) fn at(&mut self, symbol: &str) {
        self.out.push(HackInst::at(symbol));
    }

    pub(crate) fn at_const(&mut self, value: u16) {
        self.out.push(HackInst::at_const(value));
    }

    pub(crate) fn assign(&mut self, dest: Dest, comp: Comp) {
        self.out.push(HackInst::assign(dest, comp));
    }

    pub(crate) fn branch(&mut self, comp: Comp, jump: Jump) {
        self.out.push(HackInst::branch(comp, jump));
    }

    pub(crate) fn label(&mut self, name: &str) {
        self.out.push(HackInst::label(name));
    }

    pub(crate) fn jump_to(&mut self, symbol: &str) {
        self.at(symbol);
        self.branch(Comp::Zero, Jump::JMP);
    }

    /// RAM[SP] = D; SP += 1
    pub(crate) fn push_d(&mut self) {
        self.at(SP);
        self.assign(Dest::A, Comp::M);
        self.assign(Dest::M, Comp::D);
        self.at(SP);
        self.assign(Dest::M, Comp::MPlusOne);
    }

    /// SP -= 1; D = RAM[SP]
    fn pop_to_d(&mut self) {
        self.at(SP);
        self.assign(Dest::AM, Comp::MMinusOne);
        self.assign(Dest::D, Comp::M);
    }

    /// Labels are qualified by the current function name so that same-named
    /// labels in different subroutines never collide.
    fn qualify(&self, label: &str) -> String {
        if self.ctx.function.is_empty() {
            label.to_string()
        } else {
            format!("{}${}", self.ctx.function, label)
        }
    }

    fn ret_label(&mut self) -> String {
        format!("$RET.{}", self.ctx.ids.next_id())
    }
}

/// Base register symbol of a pointer-addressed segment.
fn base_register(segment: Segment) -> &'static str {
    match segment {
        Segment::Local => LCL,
        Segment::Argument => ARG,
        Segment::This => THIS,
        Segment::That => THAT,
        _ => unreachable!("segment {segment} has no base register"),
    }
}

/// Resolve a `temp` or `pointer` access to its fixed RAM address.
fn fixed_address(segment: Segment, index: u16) -> Result<u16, LowerError> {
    let (base, cells) = match segment {
        Segment::Temp => (TEMP_BASE, 8),
        Segment::Pointer => (POINTER_BASE, 2),
        _ => unreachable!("segment {segment} is not fixed-base"),
    };
    if index >= cells {
        return Err(LowerError::IndexOutOfRange { segment, index });
    }
    Ok(base + index)
}

fn lower_push(e: &mut Emitter<'_>, segment: Segment, index: u16) -> Result<(), LowerError> {
    match segment {
        Segment::Constant => {
            // literal value, no memory access
            e.at_const(index);
            e.assign(Dest::D, Comp::A);
        }
        Segment::Local | Segment::Argument | Segment::This | Segment::That => {
            e.at_const(index);
            e.assign(Dest::D, Comp::A);
            e.at(base_register(segment));
            e.assign(Dest::A, Comp::DPlusM);
            e.assign(Dest::D, Comp::M);
        }
        Segment::Temp | Segment::Pointer => {
            e.at_const(fixed_address(segment, index)?);
            e.assign(Dest::D, Comp::M);
        }
        Segment::Static => {
            e.at(&format!("{}.{}", e.ctx.class, index));
            e.assign(Dest::D, Comp::M);
        }
    }
    e.push_d();
    Ok(())
}

fn lower_pop(e: &mut Emitter<'_>, segment: Segment, index: u16) -> Result<(), LowerError> {
    match segment {
        Segment::Constant => return Err(LowerError::PopConstant),
        Segment::Local | Segment::Argument | Segment::This | Segment::That => {
            // target address to scratch first; D is needed for the value
            e.at(base_register(segment));
            e.assign(Dest::D, Comp::M);
            e.at_const(index);
            e.assign(Dest::D, Comp::DPlusA);
            e.at(R13);
            e.assign(Dest::M, Comp::D);
            e.pop_to_d();
            e.at(R13);
            e.assign(Dest::A, Comp::M);
            e.assign(Dest::M, Comp::D);
        }
        Segment::Temp | Segment::Pointer => {
            // writing pointer 0/1 retargets the THIS/THAT base registers
            let address = fixed_address(segment, index)?;
            e.pop_to_d();
            e.at_const(address);
            e.assign(Dest::M, Comp::D);
        }
        Segment::Static => {
            let symbol = format!("{}.{}", e.ctx.class, index);
            e.pop_to_d();
            e.at(&symbol);
            e.assign(Dest::M, Comp::D);
        }
    }
    Ok(())
}

fn lower_arithmetic(e: &mut Emitter<'_>, op: ArithOp) {
    match op {
        ArithOp::Add | ArithOp::Sub | ArithOp::And | ArithOp::Or => {
            e.pop_to_d();
            e.assign(Dest::A, Comp::AMinusOne);
            let comp = match op {
                ArithOp::Add => Comp::DPlusM,
                ArithOp::Sub => Comp::MMinusD,
                ArithOp::And => Comp::DAndM,
                _ => Comp::DOrM,
            };
            e.assign(Dest::M, comp);
        }
        ArithOp::Neg | ArithOp::Not => {
            e.at(SP);
            e.assign(Dest::A, Comp::MMinusOne);
            let comp = if op == ArithOp::Neg {
                Comp::NegM
            } else {
                Comp::NotM
            };
            e.assign(Dest::M, comp);
        }
        ArithOp::Eq | ArithOp::Gt | ArithOp::Lt => {
            // No native comparison output: dispatch to one of the three
            // shared subroutines. The operand difference goes to R13, a
            // synthesized return address to R14; the subroutine pushes the
            // -1/0 sentinel and jumps back indirectly. Control is strictly
            // sequential and non-recursive, so the scratch registers are
            // safe to reuse.
            e.pop_to_d();
            e.at(SP);
            e.assign(Dest::AM, Comp::MMinusOne);
            e.assign(Dest::D, Comp::MMinusD);
            e.at(R13);
            e.assign(Dest::M, Comp::D);
            let ret = e.ret_label();
            e.at(&ret);
            e.assign(Dest::D, Comp::A);
            e.at(R14);
            e.assign(Dest::M, Comp::D);
            let routine = match op {
                ArithOp::Eq => CMP_EQ,
                ArithOp::Gt => CMP_GT,
                _ => CMP_LT,
            };
            e.jump_to(routine);
            e.label(&ret);
        }
    }
}

fn lower_function(e: &mut Emitter<'_>, name: &str, n_locals: u16) {
    e.ctx.function = name.to_string();
    e.label(name);
    // zero-fill exactly n_locals slots, advancing SP past the local frame
    for _ in 0..n_locals {
        e.at(SP);
        e.assign(Dest::A, Comp::M);
        e.assign(Dest::M, Comp::Zero);
        e.at(SP);
        e.assign(Dest::M, Comp::MPlusOne);
    }
}

/// The caller side of the calling convention. Shared with the bootstrap
/// sequence, which calls the program's entry subroutine the same way.
pub(crate) fn emit_call(e: &mut Emitter<'_>, name: &str, n_args: u16) {
    let ret = e.ret_label();
    // push the synthesized return address
    e.at(&ret);
    e.assign(Dest::D, Comp::A);
    e.push_d();
    // push the caller's four base registers, in fixed order
    for reg in [LCL, ARG, THIS, THAT] {
        e.at(reg);
        e.assign(Dest::D, Comp::M);
        e.push_d();
    }
    // ARG = SP - n_args - 5 (5 = return address + four base registers)
    e.at(SP);
    e.assign(Dest::D, Comp::M);
    e.at_const(n_args + 5);
    e.assign(Dest::D, Comp::DMinusA);
    e.at(ARG);
    e.assign(Dest::M, Comp::D);
    // LCL = SP
    e.at(SP);
    e.assign(Dest::D, Comp::M);
    e.at(LCL);
    e.assign(Dest::M, Comp::D);
    e.jump_to(name);
    e.label(&ret);
}

fn lower_return(e: &mut Emitter<'_>) {
    // frame base to scratch
    e.at(LCL);
    e.assign(Dest::D, Comp::M);
    e.at(R13);
    e.assign(Dest::M, Comp::D);
    // the return address sits at frame - 5; it must be saved before the
    // return value lands in the caller's arg-0 slot, which is the same cell
    // when the call passed no arguments
    e.at_const(5);
    e.assign(Dest::A, Comp::DMinusA);
    e.assign(Dest::D, Comp::M);
    e.at(R14);
    e.assign(Dest::M, Comp::D);
    // copy the return value into the slot the caller's argument 0 occupied
    e.pop_to_d();
    e.at(ARG);
    e.assign(Dest::A, Comp::M);
    e.assign(Dest::M, Comp::D);
    // SP = ARG + 1, just past the return value
    e.at(ARG);
    e.assign(Dest::D, Comp::MPlusOne);
    e.at(SP);
    e.assign(Dest::M, Comp::D);
    // restore the caller's base registers, reading backward through the
    // saved frame base
    for reg in [THAT, THIS, ARG, LCL] {
        e.at(R13);
        e.assign(Dest::AM, Comp::MMinusOne);
        e.assign(Dest::D, Comp::M);
        e.at(reg);
        e.assign(Dest::M, Comp::D);
    }
    // jump to the saved return address
    e.at(R14);
    e.assign(Dest::A, Comp::M);
    e.branch(Comp::Zero, Jump::JMP);
}

/// Lower one VM command to Hack instructions.
///
/// An [`VmCommand::Unknown`] carrier is rejected here as fatal; it must
/// never pass through as a no-op.
pub fn lower(command: &VmCommand, ctx: &mut LowerContext) -> Result<Vec<HackInst>, LowerError> {
    let mut e = Emitter::new(ctx);
    match command {
        VmCommand::Arithmetic(op) => lower_arithmetic(&mut e, *op),
        VmCommand::Push { segment, index } => lower_push(&mut e, *segment, *index)?,
        VmCommand::Pop { segment, index } => lower_pop(&mut e, *segment, *index)?,
        VmCommand::Label(name) => {
            let qualified = e.qualify(name);
            e.label(&qualified);
        }
        VmCommand::Goto(name) => {
            let qualified = e.qualify(name);
            e.jump_to(&qualified);
        }
        VmCommand::IfGoto(name) => {
            e.pop_to_d();
            let qualified = e.qualify(name);
            e.at(&qualified);
            e.branch(Comp::D, Jump::JNE);
        }
        VmCommand::Function { name, n_locals } => lower_function(&mut e, name, *n_locals),
        VmCommand::Call { name, n_args } => emit_call(&mut e, name, *n_args),
        VmCommand::Return => lower_return(&mut e),
        VmCommand::Unknown { line } => {
            return Err(LowerError::UnknownCommand(line.clone()));
        }
    }
    Ok(e.out)
}

/// Lower a whole VM source file. The class name scopes `static` addressing;
/// the context carries function names and return ids across units.
pub fn translate_unit(
    source: &str,
    class: &str,
    ctx: &mut LowerContext,
) -> Result<Vec<HackInst>, LowerError> {
    ctx.start_class(class);
    let mut out = Vec::new();
    for (line_no, command) in vm::parse_source(source) {
        if let VmCommand::Unknown { line } = &command {
            return Err(LowerError::UnknownCommand(format!("line {line_no}: {line}")));
        }
        out.extend(lower(&command, ctx)?);
    }
    log::debug!("lowered unit {class}: {} instructions", out.len());
    Ok(out)
}
