use xrw_asm::{Indirect, Operand};
use xrw_types::{Register, Width};

use super::ByteReader;
use xrw_asm::DecodeError;

/// The two halves of a decoded ModR/M byte: the `reg` field (always a
/// register) and the `rm` field (a register when `mod == 3`, otherwise a
/// memory operand built from an optional SIB byte and displacement).
pub struct ModRm {
    pub reg: Register,
    pub rm: Operand,
}

/// Decodes a ModR/M byte (and, when present, its SIB byte and
/// displacement) out of `reader`, per Intel SDM §2.1.
///
/// `width` is the operand width already chosen from the prefix/opcode
/// (REX.W, `0x66`, and the opcode's default size); it is stamped onto both
/// halves of the returned `ModRm`.
pub fn decode_modrm(
    reader: &mut ByteReader,
    rex_r: bool,
    rex_x: bool,
    rex_b: bool,
    width: Width,
) -> Result<ModRm, DecodeError> {
    let modrm = reader.read_u8()?;
    let md = (modrm >> 6) & 0b11;
    let reg_field = (modrm >> 3) & 0b111;
    let rm_field = modrm & 0b111;

    let reg = Register::gp(reg_field + if rex_r { 8 } else { 0 });

    if md == 0b11 {
        let rm_reg = Register::gp(rm_field + if rex_b { 8 } else { 0 });
        return Ok(ModRm {
            reg,
            rm: Operand::register(width, rm_reg),
        });
    }

    let (base, index, scale, mut extra_disp) = if rm_field == 0b100 {
        let sib = reader.read_u8()?;
        let scale = 1u8 << ((sib >> 6) & 0b11);
        let index_field = (sib >> 3) & 0b111;
        let base_field = sib & 0b111;

        let index = if index_field == 0b100 && !rex_x {
            Register::None
        } else {
            Register::gp(index_field + if rex_x { 8 } else { 0 })
        };
        let scale = if index.is_none() { 0 } else { scale };

        if base_field == 0b101 && md == 0b00 {
            (Register::None, index, scale, reader.read_i32()? as i64)
        } else {
            let base = Register::gp(base_field + if rex_b { 8 } else { 0 });
            (base, index, scale, 0)
        }
    } else if rm_field == 0b101 && md == 0b00 {
        // RIP-relative addressing is out of scope for this IR (the source
        // never encountered position-independent generated code); treat it
        // as a zero-base, disp32 operand instead of a relative-to-rip one.
        (Register::None, Register::None, 0, reader.read_i32()? as i64)
    } else {
        let base = Register::gp(rm_field + if rex_b { 8 } else { 0 });
        (base, Register::None, 0, 0)
    };

    let displacement = match md {
        0b00 => extra_disp,
        0b01 => {
            extra_disp += reader.read_i8()? as i64;
            extra_disp
        }
        0b10 => {
            extra_disp += reader.read_i32()? as i64;
            extra_disp
        }
        _ => unreachable!("mod == 3 handled above"),
    };

    let addr = Indirect::new(base, displacement).with_index(index, scale);
    Ok(ModRm {
        reg,
        rm: Operand::indirect(width, addr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_over(bytes: &'static [u8]) -> ByteReader {
        ByteReader::new(bytes.as_ptr(), bytes.len(), 0)
    }

    #[test]
    fn mod3_decodes_two_registers() {
        // 0xC0 = 11_000_000: mod=3, reg=rax, rm=rax
        let mut r = reader_over(&[0xC0]);
        let modrm = decode_modrm(&mut r, false, false, false, Width::W64).unwrap();
        assert_eq!(modrm.reg, Register::Rax);
        assert_eq!(modrm.rm, Operand::register(Width::W64, Register::Rax));
    }

    #[test]
    fn mod1_reads_signed_8_bit_displacement() {
        // 0x45 = 01_000_101: mod=1, reg=rax, rm=rbp(+disp8)
        let mut r = reader_over(&[0x45, 0xF8]); // disp8 = -8
        let modrm = decode_modrm(&mut r, false, false, false, Width::W64).unwrap();
        match modrm.rm {
            Operand::Indirect { addr, .. } => {
                assert_eq!(addr.base, Register::Rbp);
                assert_eq!(addr.displacement, -8);
            }
            other => panic!("expected Indirect, got {other:?}"),
        }
    }

    #[test]
    fn sib_with_no_index_decodes_base_only() {
        // modrm 0x04 = 00_000_100: mod=0, reg=rax, rm=100(SIB follows)
        // sib 0x24 = 00_100_100: scale=1, index=100(none), base=rsp
        let mut r = reader_over(&[0x04, 0x24]);
        let modrm = decode_modrm(&mut r, false, false, false, Width::W64).unwrap();
        match modrm.rm {
            Operand::Indirect { addr, .. } => {
                assert_eq!(addr.base, Register::Rsp);
                assert!(addr.index.is_none());
                assert_eq!(addr.scale, 0);
            }
            other => panic!("expected Indirect, got {other:?}"),
        }
    }

    #[test]
    fn sib_base_none_with_mod0_reads_disp32() {
        // modrm 0x04: mod=0, rm=100(SIB)
        // sib 0x05 = 00_000_101: scale=1, index=000(rax), base=101 -> none with disp32
        let mut r = reader_over(&[0x04, 0x05, 0x10, 0x00, 0x00, 0x00]);
        let modrm = decode_modrm(&mut r, false, false, false, Width::W64).unwrap();
        match modrm.rm {
            Operand::Indirect { addr, .. } => {
                assert!(addr.base.is_none());
                assert_eq!(addr.index, Register::Rax);
                assert_eq!(addr.displacement, 0x10);
            }
            other => panic!("expected Indirect, got {other:?}"),
        }
    }
}
