mod modrm;

use xrw_asm::{Code, Condition, DecodeError, Instr, InstrKind, OperandEncoding, Operand, Passthrough, PrefixSet, RexBits, StateChange};
use xrw_types::{Register, Width};

use crate::error::{RewriteError, RewriteResult};
use modrm::decode_modrm;

/// A cursor over the raw bytes of the function being decoded. Reads
/// directly from the host pointer the caller handed `decode_function` —
/// there is no copy of the function's bytes, matching the source's
/// in-place decode over the live code page.
pub(crate) struct ByteReader {
    base: *const u8,
    /// Hard cap on how far past `base` this reader will read, independent
    /// of the caller's decode budget: enough slack past the budget for one
    /// instruction's trailing immediate/displacement bytes, so a budget
    /// that ends mid-instruction does not panic.
    cap: usize,
    offset: usize,
}

impl ByteReader {
    pub(crate) fn new(base: *const u8, cap: usize, offset: usize) -> ByteReader {
        ByteReader { base, cap, offset }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.offset >= self.cap {
            return Err(DecodeError::MalformedInput(format!(
                "read past the {}-byte decode window at offset {}",
                self.cap, self.offset
            )));
        }
        // SAFETY: `offset < cap` just checked, and `cap` was sized by the
        // caller to stay within readable memory (the decode budget plus a
        // fixed instruction-length slack).
        let byte = unsafe { *self.base.add(self.offset) };
        self.offset += 1;
        Ok(byte)
    }

    pub(crate) fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let mut bytes = [0u8; 4];
        for b in &mut bytes {
            *b = self.read_u8()?;
        }
        Ok(i32::from_le_bytes(bytes))
    }
}

/// Accumulated prefix-scan state for one instruction.
#[derive(Default)]
struct Prefixes {
    set: PrefixSet,
    rex: Option<RexBits>,
}

fn scan_prefixes(reader: &mut ByteReader) -> Result<(Prefixes, u8), DecodeError> {
    let mut prefixes = Prefixes::default();
    loop {
        let byte = reader.read_u8()?;
        if let Some(flag) = PrefixSet::from_byte(byte) {
            prefixes.set |= flag;
            continue;
        }
        if let Some(rex) = RexBits::from_byte(byte) {
            prefixes.rex = Some(rex);
            continue;
        }
        return Ok((prefixes, byte));
    }
}

fn operand_width(rex_w: bool, prefixes: PrefixSet) -> Width {
    if rex_w {
        Width::W64
    } else if prefixes.contains(PrefixSet::OPERAND_SIZE) {
        Width::W16
    } else {
        Width::W32
    }
}

/// Decodes exactly one instruction starting at `reader`'s current offset,
/// returning the `Instr` and leaving `reader` positioned just past it.
///
/// Never fails on an unrecognized opcode: it produces an `Invalid`
/// instruction of length 1 instead, per the decoder's documented
/// failure-tolerant contract. Only genuinely out-of-bounds reads (running
/// off the end of the supplied decode window mid-instruction) return an
/// error.
pub(crate) fn decode_one(reader: &mut ByteReader) -> Result<Instr, DecodeError> {
    let start = reader.offset();
    let address = start as u64;
    let (prefixes, opcode) = scan_prefixes(reader)?;
    let rex = prefixes.rex.unwrap_or_default();
    let width = operand_width(rex.w, prefixes.set);

    let instr = match opcode {
        0xC3 => Instr::simple(address, 0, InstrKind::Ret),

        0x50..=0x57 => {
            let reg = Register::gp((opcode - 0x50) + if rex.b { 8 } else { 0 });
            Instr::unary(address, 0, InstrKind::Push, Width::W64, Operand::register(Width::W64, reg))
        }
        0x58..=0x5F => {
            let reg = Register::gp((opcode - 0x58) + if rex.b { 8 } else { 0 });
            Instr::unary(address, 0, InstrKind::Pop, Width::W64, Operand::register(Width::W64, reg))
        }

        0x89 | 0x8B | 0x01 | 0x29 => {
            let modrm = decode_modrm(reader, rex.r, rex.x, rex.b, width)?;
            let reg_operand = Operand::register(width, modrm.reg);
            let (kind, dst, src) = match opcode {
                // MR: register field is the source, r/m is the destination.
                0x89 => (InstrKind::Mov, modrm.rm, reg_operand),
                // RM: register field is the destination, r/m is the source.
                0x8B => (InstrKind::Mov, reg_operand, modrm.rm),
                0x01 => (InstrKind::Add, modrm.rm, reg_operand),
                0x29 => (InstrKind::Sub, modrm.rm, reg_operand),
                _ => unreachable!(),
            };
            Instr::binary(address, 0, kind, width, dst, src)
        }

        0x90 => Instr::simple(address, 0, InstrKind::Nop)
            .attach_passthrough(Passthrough::new(&[0x90]).with_prefixes(prefixes.set)),

        0xC9 => Instr::unary(address, 0, InstrKind::Leave, Width::W64, Operand::register(Width::W64, Register::Rbp))
            .attach_passthrough(
                Passthrough::new(&[0xC9])
                    .with_prefixes(prefixes.set)
                    .with_state_change(StateChange::DstDynamic),
            ),

        0x70..=0x7F => {
            let rel8 = reader.read_i8()?;
            let condition = Condition::from_nibble(opcode & 0x0F);
            Instr::unary(
                address,
                0,
                InstrKind::Jcc(condition),
                Width::None,
                Operand::immediate(Width::W8, rel8 as i64),
            )
            .attach_passthrough(
                Passthrough::new(&[opcode])
                    .with_prefixes(prefixes.set)
                    .with_encoding(OperandEncoding::None),
            )
        }

        _ => {
            return Ok(Instr::simple(address, (reader.offset() - start) as u8, InstrKind::Invalid));
        }
    };

    let length = (reader.offset() - start) as u8;
    Ok(Instr { length, ..instr })
}

/// Walks the byte stream at `base`, decoding up to `budget` bytes (plus a
/// fixed per-instruction slack so the final instruction's trailing bytes
/// are never truncated) into `code`, stopping early on a `RET` if
/// `stop_at_ret` is set.
#[tracing::instrument(skip(code), fields(budget, stop_at_ret))]
pub fn decode_function(base: *const u8, budget: usize, stop_at_ret: bool, code: &mut Code) -> RewriteResult<()> {
    const MAX_INSTR_BYTES: usize = 16;
    let mut reader = ByteReader::new(base, budget + MAX_INSTR_BYTES, 0);

    while reader.offset() < budget {
        let instr = decode_one(&mut reader).map_err(RewriteError::from)?;
        let is_ret = matches!(instr.kind, InstrKind::Ret);
        tracing::trace!(address = instr.address, kind = ?instr.kind, length = instr.length, "decoded instruction");
        code.push(instr).map_err(RewriteError::from)?;
        if is_ret && stop_at_ret {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bytes(bytes: &'static [u8]) -> Code {
        let mut code = Code::with_capacity(16);
        decode_function(bytes.as_ptr(), bytes.len(), true, &mut code).unwrap();
        code
    }

    #[test]
    fn decodes_ret() {
        let code = decode_bytes(&[0xC3]);
        assert_eq!(code.len(), 1);
        assert_eq!(code.as_slice()[0].kind, InstrKind::Ret);
        assert_eq!(code.as_slice()[0].length, 1);
    }

    #[test]
    fn decodes_push_pop_mov_identity_function() {
        // push rbp; mov rbp,rsp; mov eax,edi; pop rbp; ret
        let code = decode_bytes(&[0x55, 0x48, 0x89, 0xE5, 0x89, 0xF8, 0x5D, 0xC3]);
        let kinds: Vec<_> = code.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![InstrKind::Push, InstrKind::Mov, InstrKind::Mov, InstrKind::Pop, InstrKind::Ret]
        );
    }

    #[test]
    fn decode_length_matches_bytes_consumed() {
        // mov rbp, rsp = 48 89 e5 -> length 3
        let code = decode_bytes(&[0x48, 0x89, 0xE5, 0xC3]);
        assert_eq!(code.as_slice()[0].length, 3);
    }

    #[test]
    fn nop_is_passthrough_and_byte_identical() {
        let code = decode_bytes(&[0x90, 0xC3]);
        let nop = &code.as_slice()[0];
        assert!(nop.is_passthrough());
        assert_eq!(nop.passthrough.unwrap().opcode(), &[0x90]);
    }

    #[test]
    fn unknown_opcode_becomes_invalid_length_one() {
        let code = decode_bytes(&[0xF1, 0xC3]);
        assert_eq!(code.as_slice()[0].kind, InstrKind::Invalid);
        assert_eq!(code.as_slice()[0].length, 1);
    }

    #[test]
    fn jcc_rel8_carries_the_condition_and_displacement() {
        let code = decode_bytes(&[0x74, 0x02, 0xC3]); // je +2
        match code.as_slice()[0].kind {
            InstrKind::Jcc(cond) => assert_eq!(cond, Condition::Equal),
            other => panic!("expected Jcc, got {other:?}"),
        }
    }

    proptest::proptest! {
        #[test]
        fn push_reg_decode_length_matches_rex_presence(field in 0u8..8, use_rex in proptest::prelude::any::<bool>()) {
            let mut bytes = Vec::new();
            if use_rex {
                bytes.push(0x41); // REX.B, no other bits
            }
            bytes.push(0x50 + field);
            bytes.push(0xC3);
            let mut code = Code::with_capacity(4);
            decode_function(bytes.as_ptr(), bytes.len(), true, &mut code).unwrap();
            let push = &code.as_slice()[0];
            proptest::prop_assert_eq!(push.kind, InstrKind::Push);
            proptest::prop_assert_eq!(push.length as usize, if use_rex { 2 } else { 1 });
        }
    }
}
