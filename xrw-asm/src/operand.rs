use xrw_types::{Displacement, Register, Scale, Width};

use crate::prefix::SegmentOverride;

/// A memory operand's addressing-mode components: `base + scale*index + displacement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Indirect {
    pub base: Register,
    pub index: Register,
    /// `0` means "no index register"; `ireg` is meaningful iff `scale > 0`.
    pub scale: Scale,
    pub displacement: Displacement,
    pub segment: SegmentOverride,
}

impl Indirect {
    pub const fn new(base: Register, displacement: Displacement) -> Indirect {
        Indirect {
            base,
            index: Register::None,
            scale: 0,
            displacement,
            segment: SegmentOverride::None,
        }
    }

    pub fn with_index(mut self, index: Register, scale: Scale) -> Indirect {
        self.index = index;
        self.scale = scale;
        self
    }

    pub fn with_segment(mut self, segment: SegmentOverride) -> Indirect {
        self.segment = segment;
        self
    }

    /// Whether this operand's invariants hold: `index` is `None` exactly
    /// when `scale == 0`.
    pub fn is_well_formed(&self) -> bool {
        (self.scale == 0) == self.index.is_none()
    }
}

/// A single instruction operand: an immediate, a register, or a memory
/// reference. Tagged variants rather than a union-by-convention struct —
/// validity conditions (e.g. "ireg meaningful iff scale > 0") live in
/// `Indirect`'s shape instead of being left to caller discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    None,
    Immediate { width: Width, value: i64 },
    Register { width: Width, reg: Register },
    Indirect { width: Width, addr: Indirect },
}

impl Operand {
    pub const fn immediate(width: Width, value: i64) -> Operand {
        Operand::Immediate { width, value }
    }

    pub const fn register(width: Width, reg: Register) -> Operand {
        Operand::Register { width, reg }
    }

    pub const fn indirect(width: Width, addr: Indirect) -> Operand {
        Operand::Indirect { width, addr }
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }

    pub const fn is_immediate(&self) -> bool {
        matches!(self, Operand::Immediate { .. })
    }

    pub const fn is_register(&self) -> bool {
        matches!(self, Operand::Register { .. })
    }

    /// A register operand naming one of the 16 general-purpose integers.
    pub fn is_gp_register(&self) -> bool {
        matches!(self, Operand::Register { reg, .. } if reg.is_gp())
    }

    pub fn is_vector_register(&self) -> bool {
        matches!(self, Operand::Register { reg, .. } if reg.is_vector())
    }

    pub const fn is_indirect(&self) -> bool {
        matches!(self, Operand::Indirect { .. })
    }

    /// The width this operand was decoded with, or `Width::None` for `Operand::None`.
    pub const fn width(&self) -> Width {
        match self {
            Operand::None => Width::None,
            Operand::Immediate { width, .. }
            | Operand::Register { width, .. }
            | Operand::Indirect { width, .. } => *width,
        }
    }

    /// The register this operand names, if it is a `Register` operand.
    pub fn register(&self) -> Option<Register> {
        match self {
            Operand::Register { reg, .. } => Some(*reg),
            _ => None,
        }
    }
}

impl Default for Operand {
    fn default() -> Self {
        Operand::None
    }
}

/// The ModR/M-level operand-encoding scheme, recorded on passthrough
/// instructions so the emitter knows how to lay out the ModR/M byte when
/// re-encoding rather than guessing from operand order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperandEncoding {
    /// No ModR/M byte (e.g. `RET`, `PUSH r` using `0x50+r`).
    #[default]
    None,
    /// ModR/M `reg` field is the source, `rm` is the destination (e.g. `0x89 MOV r/m, r`).
    Mr,
    /// ModR/M `reg` field is the destination, `rm` is the source (e.g. `0x8B MOV r, r/m`).
    Rm,
    /// `rm` destination plus an immediate operand.
    Rmi,
}
