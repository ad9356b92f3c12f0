//! The x86-64 instruction IR: operands, instruction records, prefix and
//! condition-code bookkeeping, and the bounded `Code` buffer the decoder
//! fills and the emulator/emitter consume.
//!
//! This crate defines the *shape* of a decoded instruction; the byte-level
//! decode procedure itself lives in `xrw-vm`, which depends on this crate
//! the way `fuel-vm` depends on `fuel-asm` for its `Instruction`/`Opcode`
//! types.

mod code;
mod condition;
mod error;
mod instr;
mod operand;
mod passthrough;
mod prefix;

pub use code::Code;
pub use condition::Condition;
pub use error::DecodeError;
pub use instr::{Instr, InstrKind, OperandForm};
pub use operand::{Indirect, Operand, OperandEncoding};
pub use passthrough::{Passthrough, StateChange};
pub use prefix::{PrefixSet, RexBits, SegmentOverride};
