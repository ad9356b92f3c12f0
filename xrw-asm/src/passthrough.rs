use crate::operand::OperandEncoding;
use crate::prefix::PrefixSet;

/// Whether emulating a passthrough instruction changes what the emulator
/// knows about its destination operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StateChange {
    /// The instruction's destination keeps whatever tag it already had
    /// (e.g. `NOP`, which touches no operand at all).
    #[default]
    None,
    /// The destination becomes `Unknown` regardless of its sources (e.g.
    /// `LEAVE`, whose effect on `rsp`/`rbp` the emulator does not fold).
    DstDynamic,
}

/// Carried on any `Instr` the emulator does not model natively, recording
/// enough of the original encoding for the emitter to reproduce it
/// byte-identically without re-deriving it from the IR's semantic fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Passthrough {
    /// Up to 4 verbatim opcode bytes (including the `0x0F` second-map byte,
    /// if any), left-aligned; `len` says how many are valid.
    pub opcode_bytes: [u8; 4],
    pub opcode_len: u8,
    pub prefixes: PrefixSet,
    pub encoding: OperandEncoding,
    pub state_change: StateChange,
}

impl Passthrough {
    pub fn new(opcode_bytes: &[u8]) -> Passthrough {
        assert!(
            !opcode_bytes.is_empty() && opcode_bytes.len() <= 4,
            "passthrough opcode must carry 1 to 4 bytes, got {}",
            opcode_bytes.len()
        );
        let mut bytes = [0u8; 4];
        bytes[..opcode_bytes.len()].copy_from_slice(opcode_bytes);
        Passthrough {
            opcode_bytes: bytes,
            opcode_len: opcode_bytes.len() as u8,
            prefixes: PrefixSet::empty(),
            encoding: OperandEncoding::None,
            state_change: StateChange::None,
        }
    }

    pub fn with_prefixes(mut self, prefixes: PrefixSet) -> Passthrough {
        self.prefixes = prefixes;
        self
    }

    pub fn with_encoding(mut self, encoding: OperandEncoding) -> Passthrough {
        self.encoding = encoding;
        self
    }

    pub fn with_state_change(mut self, state_change: StateChange) -> Passthrough {
        self.state_change = state_change;
        self
    }

    pub fn opcode(&self) -> &[u8] {
        &self.opcode_bytes[..self.opcode_len as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_slice_matches_constructed_length() {
        let pt = Passthrough::new(&[0x0F, 0x1F]);
        assert_eq!(pt.opcode(), &[0x0F, 0x1F]);
    }

    #[test]
    #[should_panic]
    fn rejects_empty_opcode() {
        Passthrough::new(&[]);
    }
}
