//! Decode a compiled x86-64 function, partially evaluate it against a set
//! of caller-supplied argument values, and emit a specialized replacement
//! into freshly mapped executable memory.
//!
//! The pipeline mirrors the three-stage shape of a bytecode interpreter
//! split into decode → step → emit stages: [`decoder`] turns raw bytes
//! into [`xrw_asm::Instr`] records, [`interpreter`] steps them against an
//! [`interpreter::EmuState`] tracking which values are compile-time Known
//! versus runtime Unknown, and [`emitter`] walks whatever instructions
//! survive that pass (the *residual* IR) back into machine code.

mod arena;
mod config;
mod consts;
mod decoder;
mod emitter;
mod entry;
mod error;
mod interpreter;
mod printer;

pub use arena::Arena;
pub use config::SpecializeOptions;
pub use consts::{ARG_REGISTERS, RETURN_REGISTER};
pub use decoder::decode_function;
pub use entry::{specialize, ArgValue, Specialized};
pub use error::{BailCause, BailReason, RewriteError, RewriteResult};
pub use interpreter::{EmuState, StackSlot};
pub use printer::Printer;
