use xrw_asm::{Code, Instr, InstrKind, Operand, OperandEncoding};
use xrw_types::{Register, Width};

use crate::arena::Arena;
use crate::error::{RewriteError, RewriteResult};

fn rex_byte(w: bool, r: bool, x: bool, b: bool) -> u8 {
    0x40 | (w as u8) << 3 | (r as u8) << 2 | (x as u8) << 1 | (b as u8)
}

fn needs_rex(w: bool, r: Register, rm: Register) -> bool {
    w || r.needs_rex_extension() || rm.needs_rex_extension()
}

fn modrm_reg_reg(reg_field: u8, rm: Register) -> u8 {
    0b11 << 6 | (reg_field & 0b111) << 3 | (rm.encoding() & 0b111)
}

/// Encodes one register-register instruction in the `MR` shape the
/// decoder's `0x89`/`0x01`/`0x29` table uses: opcode byte, ModR/M with
/// `reg` = source, `rm` = destination.
fn encode_mr(bytes: &mut Vec<u8>, opcode: u8, width: Width, dst: Register, src: Register) {
    let w = matches!(width, Width::W64);
    if needs_rex(w, src, dst) {
        bytes.push(rex_byte(w, src.needs_rex_extension(), false, dst.needs_rex_extension()));
    }
    bytes.push(opcode);
    bytes.push(modrm_reg_reg(src.encoding(), dst));
}

/// Encodes `op r/m, imm32` (opcode `0x81`, `/digit` selecting the
/// operation) the way the emulator's known-register-to-immediate
/// substitution needs when an `ADD`/`SUB` residualizes with a Known src.
fn encode_rm_imm32(bytes: &mut Vec<u8>, digit: u8, width: Width, dst: Register, imm: i64) {
    let w = matches!(width, Width::W64);
    if needs_rex(w, Register::Rax, dst) {
        bytes.push(rex_byte(w, false, false, dst.needs_rex_extension()));
    }
    bytes.push(0x81);
    bytes.push(modrm_reg_reg(digit, dst));
    bytes.extend_from_slice(&(imm as i32).to_le_bytes());
}

fn encode_natively_modeled(bytes: &mut Vec<u8>, instr: &Instr) -> RewriteResult<()> {
    match instr.kind {
        InstrKind::Ret => bytes.push(0xC3),
        InstrKind::Mov => match (instr.dst, instr.src) {
            (Operand::Register { reg: dst, .. }, Operand::Register { reg: src, .. }) => {
                encode_mr(bytes, 0x89, instr.value_type, dst, src);
            }
            (Operand::Register { reg: dst, .. }, Operand::Immediate { value, .. }) => {
                let w = matches!(instr.value_type, Width::W64);
                if dst.needs_rex_extension() || w {
                    bytes.push(rex_byte(w, false, false, dst.needs_rex_extension()));
                }
                bytes.push(0xB8 + (dst.encoding() & 0b111));
                bytes.extend_from_slice(&(value as i32).to_le_bytes());
            }
            _ => {
                return Err(RewriteError::UnsupportedOpcode {
                    address: instr.address,
                    kind: instr.kind,
                })
            }
        },
        InstrKind::Add | InstrKind::Sub => {
            let digit = if matches!(instr.kind, InstrKind::Add) { 0 } else { 5 };
            let opcode = if matches!(instr.kind, InstrKind::Add) { 0x01 } else { 0x29 };
            match (instr.dst, instr.src) {
                (Operand::Register { reg: dst, .. }, Operand::Register { reg: src, .. }) => {
                    encode_mr(bytes, opcode, instr.value_type, dst, src);
                }
                (Operand::Register { reg: dst, .. }, Operand::Immediate { value, .. }) => {
                    encode_rm_imm32(bytes, digit, instr.value_type, dst, value);
                }
                _ => {
                    return Err(RewriteError::UnsupportedOpcode {
                        address: instr.address,
                        kind: instr.kind,
                    })
                }
            }
        }
        _ => {
            return Err(RewriteError::UnsupportedOpcode {
                address: instr.address,
                kind: instr.kind,
            })
        }
    }
    Ok(())
}

fn encode_passthrough(bytes: &mut Vec<u8>, instr: &Instr) -> RewriteResult<()> {
    let passthrough = instr.passthrough.expect("caller checked is_passthrough");

    if passthrough.prefixes.contains(xrw_asm::PrefixSet::OPERAND_SIZE) {
        bytes.push(0x66);
    }
    if passthrough.prefixes.contains(xrw_asm::PrefixSet::REPNE) {
        bytes.push(0xF2);
    }
    if passthrough.prefixes.contains(xrw_asm::PrefixSet::REP) {
        bytes.push(0xF3);
    }

    bytes.extend_from_slice(passthrough.opcode());

    match passthrough.encoding {
        OperandEncoding::None => {}
        OperandEncoding::Mr | OperandEncoding::Rm => {
            // Re-derive ModR/M from the IR operands the decoder populated;
            // only the register-register shape is reachable today (no
            // decoded passthrough instruction carries an Indirect operand
            // yet), so that is all this encodes.
            let (reg_operand, rm_operand) = match passthrough.encoding {
                OperandEncoding::Mr => (instr.src, instr.dst),
                _ => (instr.dst, instr.src),
            };
            if let (Some(reg), Some(rm)) = (reg_operand.register(), rm_operand.register()) {
                bytes.push(modrm_reg_reg(reg.encoding(), rm));
            } else {
                return Err(RewriteError::UnsupportedOpcode {
                    address: instr.address,
                    kind: instr.kind,
                });
            }
        }
        OperandEncoding::Rmi => {
            if let (Some(rm), Operand::Immediate { value, .. }) = (instr.dst.register(), instr.src) {
                bytes.push(modrm_reg_reg(0, rm));
                bytes.extend_from_slice(&(value as i32).to_le_bytes());
            } else {
                return Err(RewriteError::UnsupportedOpcode {
                    address: instr.address,
                    kind: instr.kind,
                });
            }
        }
    }

    // For Jcc specifically, the immediate operand is the rel8 displacement
    // recorded verbatim by the decoder; relocation of in-range branches is
    // documented in the crate-level emitter design and is applied by the
    // caller before this function runs for any instruction whose target
    // survived capture.
    if let InstrKind::Jcc(_) = instr.kind {
        if let Operand::Immediate { value, .. } = instr.src {
            bytes.push(value as u8);
        }
    }

    Ok(())
}

fn encode_one(bytes: &mut Vec<u8>, instr: &Instr) -> RewriteResult<()> {
    if instr.is_passthrough() {
        encode_passthrough(bytes, instr)
    } else {
        encode_natively_modeled(bytes, instr)
    }
}

/// Encodes every instruction in `residual` and commits the bytes into
/// `arena`, returning a pointer to the first emitted byte: the entry
/// point of the specialized function.
pub fn emit(residual: &Code, arena: &mut Arena) -> RewriteResult<*const u8> {
    let mut bytes = Vec::new();
    for instr in residual {
        let before = bytes.len();
        encode_one(&mut bytes, instr)?;
        tracing::trace!(address = instr.address, kind = ?instr.kind, emitted = bytes.len() - before, "emitted");
    }
    arena.write(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrw_asm::InstrKind;

    #[test]
    fn encodes_ret() {
        let mut bytes = Vec::new();
        let instr = Instr::simple(0, 1, InstrKind::Ret);
        encode_one(&mut bytes, &instr).unwrap();
        assert_eq!(bytes, vec![0xC3]);
    }

    #[test]
    fn encodes_mov_reg_imm32_as_b8_plus_r() {
        let mut bytes = Vec::new();
        let instr = Instr::binary(
            0,
            5,
            InstrKind::Mov,
            Width::W32,
            Operand::register(Width::W32, Register::Rax),
            Operand::immediate(Width::W32, 7),
        );
        encode_one(&mut bytes, &instr).unwrap();
        assert_eq!(bytes, vec![0xB8, 7, 0, 0, 0]);
    }

    #[test]
    fn encodes_add_reg_imm32_with_digit_zero() {
        let mut bytes = Vec::new();
        let instr = Instr::binary(
            0,
            6,
            InstrKind::Add,
            Width::W32,
            Operand::register(Width::W32, Register::Rax),
            Operand::immediate(Width::W32, 10),
        );
        encode_one(&mut bytes, &instr).unwrap();
        assert_eq!(bytes, vec![0x81, 0xC0, 10, 0, 0, 0]);
    }

    #[test]
    fn passthrough_nop_round_trips_byte_identically() {
        let mut bytes = Vec::new();
        let instr = Instr::simple(0, 1, InstrKind::Nop)
            .attach_passthrough(xrw_asm::Passthrough::new(&[0x90]));
        encode_one(&mut bytes, &instr).unwrap();
        assert_eq!(bytes, vec![0x90]);
    }
}
