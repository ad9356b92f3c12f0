use std::fmt::Write as _;

use xrw_asm::{Instr, InstrKind, Operand};
use xrw_types::{Register, Width};

use crate::interpreter::{EmuState, StackSlot};

/// Pure text rendering of decoded/residual instructions and emulator
/// state, in AT&T syntax. Does no I/O of its own — like the source's
/// `instr2string`/`printEState`, callers decide where the resulting
/// `String` goes (a log line, a test assertion, a CLI's stdout).
pub struct Printer;

/// Renders a register name in AT&T syntax at the given width. `rax`-class
/// registers change their leading letter (`%eax`/`%rax`); `r8`-class
/// registers keep their name and change a numeric suffix instead
/// (`%r8d`/`%r8`), per the two different x86-64 register-naming schemes.
fn register_name(reg: Register, width: Width) -> String {
    let base = format!("{reg:?}").to_lowercase();
    if !reg.is_gp() {
        return format!("%{base}");
    }
    if reg.needs_rex_extension() {
        let suffix = match width {
            Width::W64 => "",
            Width::W32 => "d",
            Width::W16 => "w",
            Width::W8 => "b",
            _ => "",
        };
        format!("%{base}{suffix}")
    } else {
        match width {
            Width::W64 => format!("%{base}"),
            Width::W32 => format!("%e{}", &base[1..]),
            Width::W16 => format!("%{}", &base[1..]),
            Width::W8 => format!("%{}l", &base[1..2]),
            _ => format!("%{base}"),
        }
    }
}

fn format_operand(operand: &Operand) -> String {
    match *operand {
        Operand::None => String::new(),
        Operand::Immediate { value, .. } => {
            if value < 0 {
                format!("$-{:#x}", -value)
            } else {
                format!("${value:#x}")
            }
        }
        Operand::Register { reg, width } => register_name(reg, width),
        Operand::Indirect { addr, .. } => {
            let disp = if addr.displacement < 0 {
                format!("-{:#x}", -addr.displacement)
            } else {
                format!("{:#x}", addr.displacement)
            };
            let base = if addr.base.is_none() { String::new() } else { register_name(addr.base, Width::W64) };
            if addr.scale > 0 {
                format!("{disp}({base},{},{})", register_name(addr.index, Width::W64), addr.scale)
            } else {
                format!("{disp}({base})")
            }
        }
    }
}

fn mnemonic(kind: InstrKind) -> String {
    match kind {
        InstrKind::Invalid => "(invalid)".to_string(),
        InstrKind::Ret => "ret".to_string(),
        InstrKind::Nop => "nop".to_string(),
        InstrKind::Push => "push".to_string(),
        InstrKind::Pop => "pop".to_string(),
        InstrKind::Mov => "mov".to_string(),
        InstrKind::Add => "add".to_string(),
        InstrKind::Sub => "sub".to_string(),
        InstrKind::Leave => "leave".to_string(),
        InstrKind::Jcc(cond) => format!("j{cond}"),
        InstrKind::Cmp => "cmp".to_string(),
        InstrKind::Test => "test".to_string(),
        InstrKind::And => "and".to_string(),
        InstrKind::Or => "or".to_string(),
        InstrKind::Xor => "xor".to_string(),
        InstrKind::Inc => "inc".to_string(),
        InstrKind::Dec => "dec".to_string(),
        InstrKind::Neg => "neg".to_string(),
        InstrKind::Not => "not".to_string(),
        InstrKind::Imul => "imul".to_string(),
        InstrKind::Lea => "lea".to_string(),
        InstrKind::Movzx => "movzx".to_string(),
        InstrKind::Movsx => "movsx".to_string(),
        InstrKind::Jmp => "jmp".to_string(),
        InstrKind::Call => "call".to_string(),
        InstrKind::SetCc(cond) => format!("set{cond}"),
        InstrKind::CMovCc(cond) => format!("cmov{cond}"),
        InstrKind::Movss => "movss".to_string(),
        InstrKind::Movsd => "movsd".to_string(),
        InstrKind::Addss => "addss".to_string(),
        InstrKind::Addsd => "addsd".to_string(),
        InstrKind::Passthrough => "(passthrough)".to_string(),
    }
}

impl Printer {
    /// Renders one instruction as `mnemonic src, dst` (AT&T operand
    /// order), matching the source's `instr2string`, but covering every
    /// `InstrKind` the IR defines rather than just `push/pop/mov/add/sub`.
    pub fn instr(instr: &Instr) -> String {
        let op = mnemonic(instr.kind);
        let operands: Vec<String> = [instr.src, instr.src2, instr.dst]
            .into_iter()
            .filter(|o| !o.is_none())
            .map(|o| format_operand(&o))
            .collect();
        if operands.is_empty() {
            op
        } else {
            format!("{op} {}", operands.join(", "))
        }
    }

    /// Renders a whole decoded/residual sequence, one instruction per line.
    pub fn code<'a>(instrs: impl IntoIterator<Item = &'a Instr>) -> String {
        let mut out = String::new();
        for instr in instrs {
            let _ = writeln!(out, "{:#010x}: {}", instr.address, Printer::instr(instr));
        }
        out
    }

    /// Dumps a window of the emulator's private stack around the current
    /// stack pointer, tagging each byte Known/Unknown. A diagnostic aid
    /// (mirrors the source's `printEState`'s stack dump); not on the hot
    /// specialization path.
    pub fn format_stack_window(state: &EmuState, window: usize) -> String {
        let sp = state.register(Register::Rsp).value as i64;
        let lo = (sp - window as i64).max(0);
        let hi = (sp + window as i64).min(state.stack().capacity() as i64);
        let mut out = String::new();
        let _ = writeln!(out, "stack window [{lo:#x}, {hi:#x}) around sp={sp:#x}:");
        let mut addr = lo;
        while addr < hi {
            let len = (hi - addr).min(8) as usize;
            if let Ok(slots) = state.stack().load(addr, len) {
                let _ = write!(out, "  {addr:#06x}: ");
                for slot in slots {
                    let _ = write_slot(&mut out, slot);
                }
                let _ = writeln!(out);
            }
            addr += len as i64;
        }
        out
    }
}

fn write_slot(out: &mut String, slot: &StackSlot) -> std::fmt::Result {
    if slot.known {
        write!(out, "{:02x} ", slot.value)
    } else {
        write!(out, "?? ")
    }
}
