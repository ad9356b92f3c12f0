use xrw_types::{Register, Width};

use crate::condition::Condition;
use crate::operand::Operand;
use crate::passthrough::Passthrough;

/// How many of `dst`/`src`/`src2` an `Instr` actually uses. Kept as an
/// explicit tag (rather than inferring it from which operands are
/// `Operand::None`) so zero-operand instructions with an otherwise
/// meaningful `dst` slot — there are none today, but the shape should not
/// rely on that — can't be misread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandForm {
    Zero,
    One,
    Two,
    Three,
}

impl OperandForm {
    pub const fn operand_count(self) -> usize {
        match self {
            OperandForm::Zero => 0,
            OperandForm::One => 1,
            OperandForm::Two => 2,
            OperandForm::Three => 3,
        }
    }
}

/// Opcode kind. Condition-bearing families (`Jcc`, `SetCc`, `CMovCc`) carry
/// their `Condition` as a field rather than expanding into 16 variants
/// apiece, the way `fuel_asm::Opcode` carries register operands as fields
/// instead of enumerating every register combination as a bare discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrKind {
    /// Decode failure: an opcode byte the decoder does not recognize at
    /// all (not even as a passthrough candidate). Length is always 1.
    Invalid,

    Ret,
    /// `0x90`, decoded as a zero-operand passthrough to validate
    /// byte-identical re-emission of an instruction the emulator never
    /// folds.
    Nop,
    Push,
    Pop,
    Mov,
    Add,
    Sub,
    /// `0xC9`: `mov rsp, rbp; pop rbp`, modeled as a unary passthrough over
    /// `rbp` with `StateChange::DstDynamic`.
    Leave,
    Jcc(Condition),

    // Integer ALU ops beyond the natively-folded ADD/SUB, decoded as
    // passthrough (the emulator does not fold them, but the decoder still
    // classifies them for the printer and for relocation bookkeeping).
    Cmp,
    Test,
    And,
    Or,
    Xor,
    Inc,
    Dec,
    Neg,
    Not,
    Imul,
    Lea,
    Movzx,
    Movsx,

    /// Unconditional near jump (`0xE9`/`0xEB`). Relocated by the emitter
    /// like `Jcc` when its target survives capture.
    Jmp,
    /// Near call (`0xE8`). Not folded; always passthrough.
    Call,
    SetCc(Condition),
    CMovCc(Condition),

    // A small SSE subset, scalar single/double moves and adds, decoded as
    // passthrough. Present to round out opcode coverage per the IR's
    // stated scope; the emulator treats all of them as opaque.
    Movss,
    Movsd,
    Addss,
    Addsd,

    /// Any other instruction the decoder recognized well enough to record
    /// opcode bytes and an operand encoding for, but does not give a more
    /// specific `InstrKind` to. Always carries a `Passthrough` annotation.
    Passthrough,
}

impl InstrKind {
    /// Whether this kind is one the emulator folds/captures natively
    /// (as opposed to always re-emitting verbatim via `Passthrough`).
    pub const fn is_natively_modeled(self) -> bool {
        matches!(
            self,
            InstrKind::Ret
                | InstrKind::Push
                | InstrKind::Pop
                | InstrKind::Mov
                | InstrKind::Add
                | InstrKind::Sub
                | InstrKind::Jcc(_)
        )
    }
}

/// A decoded (or constructed) instruction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instr {
    pub address: u64,
    pub length: u8,
    pub kind: InstrKind,
    pub form: OperandForm,
    pub value_type: Width,
    pub dst: Operand,
    pub src: Operand,
    pub src2: Operand,
    /// Present iff this instruction must be re-emitted verbatim rather
    /// than re-encoded from its semantic fields.
    pub passthrough: Option<Passthrough>,
}

impl Instr {
    /// A zero-operand instruction (`RET`, `NOP`, ...).
    pub fn simple(address: u64, length: u8, kind: InstrKind) -> Instr {
        Instr {
            address,
            length,
            kind,
            form: OperandForm::Zero,
            value_type: Width::None,
            dst: Operand::None,
            src: Operand::None,
            src2: Operand::None,
            passthrough: None,
        }
    }

    /// A single-operand instruction (`PUSH reg`, `POP reg`, unary `LEAVE`).
    pub fn unary(address: u64, length: u8, kind: InstrKind, value_type: Width, dst: Operand) -> Instr {
        Instr {
            address,
            length,
            kind,
            form: OperandForm::One,
            value_type,
            dst,
            src: Operand::None,
            src2: Operand::None,
            passthrough: None,
        }
    }

    /// A two-operand instruction (`MOV dst, src`, `ADD dst, src`, ...).
    pub fn binary(
        address: u64,
        length: u8,
        kind: InstrKind,
        value_type: Width,
        dst: Operand,
        src: Operand,
    ) -> Instr {
        Instr {
            address,
            length,
            kind,
            form: OperandForm::Two,
            value_type,
            dst,
            src,
            src2: Operand::None,
            passthrough: None,
        }
    }

    /// A three-operand instruction (e.g. an indexed `LEA` or an `IMUL r, r/m, imm`).
    pub fn ternary(
        address: u64,
        length: u8,
        kind: InstrKind,
        value_type: Width,
        dst: Operand,
        src: Operand,
        src2: Operand,
    ) -> Instr {
        Instr {
            address,
            length,
            kind,
            form: OperandForm::Three,
            value_type,
            dst,
            src,
            src2,
            passthrough: None,
        }
    }

    /// Attaches a passthrough annotation to an already-constructed
    /// instruction. Never called as part of the zero/unary/binary/ternary
    /// constructors so that an instruction's operand shape and its
    /// passthrough-ness are set independently, matching the two-step
    /// `initXInstr` + `attachPassthrough` shape of the source.
    pub fn attach_passthrough(mut self, passthrough: Passthrough) -> Instr {
        self.passthrough = Some(passthrough);
        self
    }

    pub const fn is_passthrough(&self) -> bool {
        self.passthrough.is_some()
    }

    /// Deep-copies this instruction. `Instr` and every field it owns are
    /// `Copy`, so a bitwise copy already satisfies "no aliasing of
    /// annotations across the copy" — there is nothing behind a pointer to
    /// alias. Kept as a named operation (rather than relying on callers to
    /// reach for `Clone`/`Copy` directly) to mirror the source's explicit
    /// `copyInstr` entry point.
    pub fn deep_copy(&self) -> Instr {
        *self
    }

    /// Addresses of the first byte past this instruction's encoding.
    pub const fn next_address(&self) -> u64 {
        self.address + self.length as u64
    }

    pub fn dst_register(&self) -> Option<Register> {
        self.dst.register()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::PrefixSet;

    #[test]
    fn copy_is_independent_of_the_source() {
        let original = Instr::unary(
            0x1000,
            2,
            InstrKind::Push,
            Width::W64,
            Operand::register(Width::W64, Register::Rdi),
        );
        let mut copy = original.deep_copy();
        copy.address = 0x2000;

        assert_eq!(original.address, 0x1000);
        assert_eq!(copy.address, 0x2000);
        assert_eq!(original.dst, copy.dst);
    }

    #[test]
    fn attach_passthrough_sets_only_the_annotation() {
        let instr = Instr::simple(0x1000, 1, InstrKind::Nop);
        assert!(!instr.is_passthrough());

        let pt = Passthrough::new(&[0x90]).with_prefixes(PrefixSet::empty());
        let instr = instr.attach_passthrough(pt);
        assert!(instr.is_passthrough());
        assert_eq!(instr.form, OperandForm::Zero);
    }

    #[test]
    fn natively_modeled_kinds_match_the_folding_table() {
        assert!(InstrKind::Add.is_natively_modeled());
        assert!(InstrKind::Jcc(Condition::Equal).is_natively_modeled());
        assert!(!InstrKind::Leave.is_natively_modeled());
        assert!(!InstrKind::Passthrough.is_natively_modeled());
    }

    #[test]
    fn next_address_accounts_for_length() {
        let instr = Instr::simple(0x1000, 3, InstrKind::Ret);
        assert_eq!(instr.next_address(), 0x1003);
    }
}
