/// Errors the decoder and the IR construction helpers can raise.
///
/// Decoding itself never traps the host — an unrecognized opcode becomes
/// an `InstrKind::Invalid` entry rather than an `Err` (see `decode_one` in
/// the `decoder` module) — so this enum is deliberately small. It covers
/// the ways *using* the decoded IR can fail: running out of room in a
/// caller-supplied `Code` buffer, or a downstream consumer stepping an
/// `InstrKind::Invalid` it should have treated as fatal.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("code buffer is full at capacity {capacity}")]
    TooManyInstructions { capacity: usize },

    #[error("cannot step an invalid instruction at address {address:#x}")]
    InvalidInstruction { address: u64 },

    #[error("malformed byte slice: {0}")]
    MalformedInput(String),
}
