//! Atomic types shared by the decoder, emulator, and emitter crates.
//!
//! Kept deliberately small and dependency-light, mirroring how the wider
//! workspace's primitive types are factored out of the crate that consumes
//! them.

mod register;
mod width;

pub use register::Register;
pub use width::Width;

/// A 64-bit machine word: the native register and stack-slot value type.
pub type Word = u64;

/// A signed displacement, as found in ModR/M and SIB byte encodings.
pub type Displacement = i64;

/// A SIB/Indirect-operand scale factor. `0` means "no index register".
pub type Scale = u8;
