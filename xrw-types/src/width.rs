use core::fmt;

/// Operand/value width, in the sense the ModR/M-based operand-size rules of
/// the x86-64 ISA compute it (legacy operand-size prefix, REX.W, and default
/// 32-bit operand size all feed into choosing one of these).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum Width {
    /// No value / not applicable (e.g. the `None` register, a `Jcc` target).
    None,
    /// Width is implied by context rather than carried on the operand
    /// (used for passthrough instructions whose width the emitter never
    /// needs to reason about directly).
    Implicit,
    W8,
    W16,
    W32,
    W64,
    W128,
    W256,
}

impl Width {
    /// Width in bits, or `None` for the non-numeric variants.
    pub const fn bits(self) -> Option<u32> {
        match self {
            Width::None | Width::Implicit => None,
            Width::W8 => Some(8),
            Width::W16 => Some(16),
            Width::W32 => Some(32),
            Width::W64 => Some(64),
            Width::W128 => Some(128),
            Width::W256 => Some(256),
        }
    }

    /// Width in bytes, or `None` for the non-numeric variants.
    pub const fn bytes(self) -> Option<u32> {
        match self.bits() {
            Some(bits) => Some(bits / 8),
            None => None,
        }
    }

    /// The width implied by a 64-bit `Word`, i.e. a full GP register.
    pub const fn word() -> Width {
        Width::W64
    }

    /// Builds the widest mask that fits this width (all-ones for `bytes()`
    /// bytes). Used by the emulator to truncate folded arithmetic results to
    /// the destination operand's width. Returns `u64::MAX` for `None`/
    /// `Implicit`/`W128`/`W256`, none of which the ALU ever masks this way.
    pub const fn mask(self) -> u64 {
        match self {
            Width::W8 => 0xFF,
            Width::W16 => 0xFFFF,
            Width::W32 => 0xFFFF_FFFF,
            Width::W64 => u64::MAX,
            Width::None | Width::Implicit | Width::W128 | Width::W256 => u64::MAX,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bits() {
            Some(bits) => write!(f, "{bits}"),
            None => write!(f, "{self:?}"),
        }
    }
}
