use xrw_asm::InstrKind;

/// The opcode and address that forced a bail-out, so a caller gets an
/// actionable diagnostic rather than a bare "specialization unavailable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BailReason {
    pub address: u64,
    pub kind: InstrKind,
    pub detail: BailCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BailCause {
    /// A conditional branch's flags were `Unknown` and this implementation
    /// takes the conservative policy of refusing to specialize rather than
    /// emitting a two-arm join (see the crate-level design notes).
    UnknownFlagsAtBranch,
    /// Flags were `Known`, but this decoder only ever decodes the
    /// fallthrough byte stream, so there is no decoded arm to fold into or
    /// discard — following the branch target is out of scope.
    ConditionalBranchNotFollowed,
}

/// The full error taxonomy for a `specialize` call.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("failed to map executable memory: {0}")]
    OutOfMemory(#[from] std::io::Error),

    #[error("arena exhausted: requested {requested} bytes with {available} available")]
    ArenaExhausted { requested: usize, available: usize },

    #[error("decoder produced an invalid instruction at address {address:#x}")]
    InvalidInstruction { address: u64 },

    #[error("stack access at offset {offset} is outside the private stack of size {stack_size}")]
    StackOutOfBounds { offset: i64, stack_size: usize },

    #[error("opcode {kind:?} at address {address:#x} has no emitter encoding")]
    UnsupportedOpcode { address: u64, kind: InstrKind },

    #[error("specialization unavailable: {reason:?}")]
    BailOut { reason: BailReason },

    #[error("malformed decode input: {0}")]
    Decode(#[from] xrw_asm::DecodeError),
}

pub type RewriteResult<T> = Result<T, RewriteError>;
