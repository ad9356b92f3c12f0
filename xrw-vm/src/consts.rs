use xrw_types::Register;

/// Default size hint for a freshly created `Arena`, in bytes. Matches the
/// source's hardcoded `CODE_SIZE`; rounded up to a whole page by
/// `Arena::create`.
pub const DEFAULT_ARENA_SIZE: usize = 4096;

/// Default byte budget for one `decode_function` call. The source's
/// decode loop had no explicit budget beyond "until RET or until the
/// fixed-size copy-through window runs out"; this implementation makes
/// the budget an explicit, tunable quantity instead.
pub const DEFAULT_DECODE_BUDGET: usize = 4096;

/// Default capacity, in instructions, of a `Code` buffer.
/// Matches the source's hardcoded instruction-array size.
pub const DEFAULT_MAX_INSTRUCTIONS: usize = 100;

/// Default size, in bytes, of the emulator's private stack buffer.
pub const DEFAULT_STACK_SIZE: usize = 4096;

/// Number of leading integer arguments the System V AMD64 ABI passes in
/// registers, and the order `specialize`'s `&[u64]` argument slice is read
/// in. Indices beyond this table are not supported; the source only ever
/// captured this many from its inline-asm prologue.
pub const ARG_REGISTERS: [Register; 5] =
    [Register::Rdi, Register::Rsi, Register::Rdx, Register::Rcx, Register::R8];

/// Register the System V AMD64 ABI returns an integer result in.
pub const RETURN_REGISTER: Register = Register::Rax;
