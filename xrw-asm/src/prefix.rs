use core::fmt;

bitflags::bitflags! {
    /// Non-REX prefix bytes accumulated during the decoder's prefix scan.
    ///
    /// Mirrors the original `PrefixSet` bitmask-by-convention, but as a real
    /// `bitflags` type rather than a raw integer the emitter has to remember
    /// the meaning of.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PrefixSet: u8 {
        /// `0x66` operand-size override.
        const OPERAND_SIZE = 0b0000_0001;
        /// `0xF2` REPNE / scalar-double SSE prefix.
        const REPNE = 0b0000_0010;
        /// `0xF3` REP / scalar-single SSE prefix.
        const REP = 0b0000_0100;
        /// `0x2E` CS segment override (also used historically as a
        /// branch-not-taken hint; this decoder only cares about the byte).
        const CS_OVERRIDE = 0b0000_1000;
        /// `0x64` FS segment override.
        const FS_OVERRIDE = 0b0001_0000;
        /// `0x65` GS segment override.
        const GS_OVERRIDE = 0b0010_0000;
    }
}

impl PrefixSet {
    /// Decodes a single non-REX prefix byte, returning `None` if `byte` is
    /// not a recognized prefix (the decoder should then stop the prefix
    /// scan and treat `byte` as the opcode).
    pub fn from_byte(byte: u8) -> Option<PrefixSet> {
        match byte {
            0x66 => Some(PrefixSet::OPERAND_SIZE),
            0xF2 => Some(PrefixSet::REPNE),
            0xF3 => Some(PrefixSet::REP),
            0x2E => Some(PrefixSet::CS_OVERRIDE),
            0x64 => Some(PrefixSet::FS_OVERRIDE),
            0x65 => Some(PrefixSet::GS_OVERRIDE),
            _ => None,
        }
    }
}

/// Segment override carried by an `Indirect` operand, as distinct from the
/// passthrough-only `PrefixSet::FS_OVERRIDE`/`GS_OVERRIDE` bits above: this
/// is the operand-level annotation the emulator and emitter reason about
/// when computing or re-encoding an effective address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::EnumIter)]
pub enum SegmentOverride {
    #[default]
    None,
    Fs,
    Gs,
}

impl fmt::Display for SegmentOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentOverride::None => Ok(()),
            SegmentOverride::Fs => write!(f, "%fs:"),
            SegmentOverride::Gs => write!(f, "%gs:"),
        }
    }
}

/// The 4 REX bits, decoded from a `0x40..=0x4F` prefix byte's low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RexBits {
    pub w: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
}

impl RexBits {
    pub fn from_byte(byte: u8) -> Option<RexBits> {
        if (0x40..=0x4F).contains(&byte) {
            Some(RexBits {
                w: byte & 0b1000 != 0,
                r: byte & 0b0100 != 0,
                x: byte & 0b0010 != 0,
                b: byte & 0b0001 != 0,
            })
        } else {
            None
        }
    }
}
