use core::fmt;

/// Canonical register identifier.
///
/// The general-purpose variants are listed in exactly the order the x86-64
/// encoding uses for the 4-bit `reg`/`rm`/`base`/`index` fields (extended to
/// r8..r15 via the REX prefix's W/R/X/B bits). Decoder and emitter arithmetic
/// of the form `Register::gp(base_field + rex_extension_bit)` depends on this
/// ordering; do not reorder the GP variants without updating every call site
/// that does register arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum Register {
    /// Sentinel: "no register" (e.g. an Indirect operand with no base).
    None = 0,
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    /// Instruction pointer; only meaningful for the extended (non-GP) IR forms.
    Rip,
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
    Xmm8,
    Xmm9,
    Xmm10,
    Xmm11,
    Xmm12,
    Xmm13,
    Xmm14,
    Xmm15,
}

impl Register {
    /// Lowest GP register discriminant (`Rax`), used as the base for
    /// `base + field` decode/emit arithmetic.
    const GP_BASE: u8 = Register::Rax as u8;

    /// Number of general-purpose integer registers (`Rax..=R15`).
    pub const GP_COUNT: u8 = 16;

    /// Maps a 4-bit encoded register field (`reg`/`rm`/SIB `base`/`index`,
    /// already widened by the relevant REX bit) to a GP register.
    ///
    /// # Panics
    ///
    /// Panics if `field >= 16`; callers are expected to mask to 4 bits first,
    /// which is always the case for values taken out of a ModR/M or SIB byte
    /// plus a single REX extension bit.
    pub fn gp(field: u8) -> Register {
        assert!(field < Self::GP_COUNT, "GP register field out of range: {field}");
        // Safety-free: `Register` is `repr(u8)` and every value in
        // `GP_BASE..GP_BASE + GP_COUNT` has a defined variant.
        match Self::GP_BASE + field {
            1 => Register::Rax,
            2 => Register::Rcx,
            3 => Register::Rdx,
            4 => Register::Rbx,
            5 => Register::Rsp,
            6 => Register::Rbp,
            7 => Register::Rsi,
            8 => Register::Rdi,
            9 => Register::R8,
            10 => Register::R9,
            11 => Register::R10,
            12 => Register::R11,
            13 => Register::R12,
            14 => Register::R13,
            15 => Register::R14,
            16 => Register::R15,
            _ => unreachable!(),
        }
    }

    /// The 4-bit encoding of this register as used in ModR/M/SIB/REX bytes.
    /// Only meaningful for GP registers; returns `0` for `None`/`Rip`/vector
    /// registers, none of which the decoder ever needs to re-encode this way.
    pub const fn encoding(self) -> u8 {
        let raw = self as u8;
        if raw >= Self::GP_BASE && raw < Self::GP_BASE + Self::GP_COUNT {
            raw - Self::GP_BASE
        } else {
            0
        }
    }

    /// Whether the low bit of the REX extension (`REX.B`/`REX.X`/`REX.R`)
    /// must be set to reach this register (i.e. it is r8..r15).
    pub const fn needs_rex_extension(self) -> bool {
        self.encoding() >= 8 && self.is_gp()
    }

    pub const fn is_none(self) -> bool {
        matches!(self, Register::None)
    }

    pub const fn is_gp(self) -> bool {
        let raw = self as u8;
        raw >= Self::GP_BASE && raw < Self::GP_BASE + Self::GP_COUNT
    }

    pub const fn is_vector(self) -> bool {
        matches!(
            self,
            Register::Xmm0
                | Register::Xmm1
                | Register::Xmm2
                | Register::Xmm3
                | Register::Xmm4
                | Register::Xmm5
                | Register::Xmm6
                | Register::Xmm7
                | Register::Xmm8
                | Register::Xmm9
                | Register::Xmm10
                | Register::Xmm11
                | Register::Xmm12
                | Register::Xmm13
                | Register::Xmm14
                | Register::Xmm15
        )
    }

    pub const fn is_ip(self) -> bool {
        matches!(self, Register::Rip)
    }
}

impl Default for Register {
    fn default() -> Self {
        Register::None
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
