use xrw_types::Register;

use crate::consts::ARG_REGISTERS;
use crate::ArgValue;

use super::memory::Stack;
use super::{EmuState, RegSlot, Tag};

impl EmuState {
    /// Builds a fresh `EmuState`: every register `Unknown` except `rsp`
    /// (`Known`, pointing at the top of a freshly allocated private stack
    /// of `stack_size` bytes) and flags `Unknown`. The stack itself starts
    /// entirely `Unknown` (no tag bits set on any byte).
    pub fn new(stack_size: usize) -> EmuState {
        let stack = Stack::new(stack_size);
        let mut state = EmuState {
            registers: [RegSlot::unknown(); Register::GP_COUNT as usize],
            flags: None,
            stack,
        };
        state.set_register(Register::Rsp, state_initial_sp(&state));
        state
    }

    /// Seeds the leading argument registers from `args`, in the order
    /// `consts::ARG_REGISTERS` lists them, per the System V AMD64 ABI
    /// subset this rewriter supports. Extra `args` beyond
    /// `ARG_REGISTERS.len()` are ignored; the source never captured more
    /// than this many either.
    pub fn with_arguments(mut self, args: &[ArgValue]) -> EmuState {
        for (&reg, arg) in ARG_REGISTERS.iter().zip(args.iter()) {
            match *arg {
                ArgValue::Known(value) => self.set_register(reg, value),
                ArgValue::Unknown => self.set_register_unknown(reg),
            }
        }
        self
    }
}

fn state_initial_sp(state: &EmuState) -> u64 {
    state.stack.initial_sp()
}

impl RegSlot {
    pub const fn unknown() -> RegSlot {
        RegSlot { tag: Tag::Unknown, value: 0 }
    }

    pub const fn known(value: u64) -> RegSlot {
        RegSlot { tag: Tag::Known, value }
    }
}
