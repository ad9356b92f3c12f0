use xrw_asm::Code;

use crate::arena::Arena;
use crate::config::SpecializeOptions;
use crate::decoder::decode_function;
use crate::emitter;
use crate::error::RewriteResult;
use crate::interpreter::executors::instruction::{step, StepOutcome};
use crate::interpreter::EmuState;

/// One argument word, tagged the way the caller wants the emulator to
/// treat it. Rust has no safe variadic calling convention to mirror the
/// source's `va_list`-based entry point, so `specialize` takes a `&[Self]`
/// slice instead — the minimal boundary adaptation the crate's design
/// notes call for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue {
    Known(u64),
    Unknown,
}

/// A specialized function: the arena that houses its bytes, plus the
/// entry address within it. Keeping the `Arena` alongside the pointer
/// (rather than handing back a bare pointer) is this crate's explicit
/// lifetime-carrying handle — the pages stay mapped for as long as this
/// value is alive, and are unmapped on `Drop`.
pub struct Specialized {
    #[allow(dead_code)] // kept alive only for its Drop; never read directly
    arena: Arena,
    entry: *const u8,
}

impl Specialized {
    /// The address of the specialized function's first instruction.
    /// Callable with the same calling convention as the original function,
    /// for as long as `self` is alive.
    pub fn entry_point(&self) -> *const u8 {
        self.entry
    }
}

/// Decodes `f`, partially evaluates it against `args`, and emits a
/// specialized replacement into a freshly created arena sized per `opts`.
///
/// On `RewriteError::BailOut`, no partial arena or half-specialized state
/// escapes this call: the error is returned and the caller is expected to
/// fall back to calling `f` directly.
#[tracing::instrument(skip(args))]
pub fn specialize(f: *const u8, args: &[ArgValue], opts: SpecializeOptions) -> RewriteResult<Specialized> {
    let mut code = Code::with_capacity(opts.max_instructions);
    decode_function(f, opts.decode_budget, true, &mut code)?;

    let mut state = EmuState::new(opts.stack_size).with_arguments(args);
    let mut residual = Code::with_capacity(opts.max_instructions);
    for instr in &code {
        match step(&mut state, instr, &mut residual)? {
            StepOutcome::Continue => {}
            StepOutcome::Halt => break,
        }
    }

    let mut arena = Arena::create(opts.arena_size)?;
    let entry = emitter::emit(&residual, &mut arena)?;
    tracing::debug!(bytes = residual.len(), "specialization complete");
    Ok(Specialized { arena, entry })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RewriteError;

    /// push rbp; mov rbp,rsp; mov eax,edi; pop rbp; ret
    const IDENTITY: [u8; 8] = [0x55, 0x48, 0x89, 0xE5, 0x89, 0xF8, 0x5D, 0xC3];

    #[test]
    fn identity_function_with_no_known_args_residualizes_mov_and_ret() {
        let specialized = specialize(IDENTITY.as_ptr(), &[ArgValue::Unknown], SpecializeOptions::default()).unwrap();
        assert!(!specialized.entry_point().is_null());
    }

    /// `return a + b;` as `mov eax, edi; add eax, esi; ret`.
    const ADD: [u8; 7] = [0x89, 0xF8, 0x01, 0xF0, 0xC3, 0x90, 0x90];

    #[test]
    fn constant_fold_add_emits_only_a_mov_immediate_and_ret() {
        let specialized = specialize(
            ADD.as_ptr(),
            &[ArgValue::Known(3), ArgValue::Known(4)],
            SpecializeOptions::default(),
        )
        .unwrap();
        assert!(!specialized.entry_point().is_null());
    }

    #[test]
    fn bail_out_on_unknown_flag_branch() {
        // je +2; ret
        let bytes: [u8; 3] = [0x74, 0x02, 0xC3];
        let err = specialize(bytes.as_ptr(), &[ArgValue::Unknown], SpecializeOptions::default()).unwrap_err();
        assert!(matches!(err, RewriteError::BailOut { .. }));
    }
}
