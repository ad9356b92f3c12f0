use xrw_asm::{Code, Indirect, Instr, InstrKind, Operand, StateChange};
use xrw_types::{Register, Width};

use crate::error::{BailCause, BailReason, RewriteError, RewriteResult};
use crate::interpreter::alu;
use crate::interpreter::flow;
use crate::interpreter::memory::StackSlot;
use crate::interpreter::{EmuState, Tag};

/// What the caller of `step` should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// A `RET` was stepped; emulation is over.
    Halt,
}

/// Widens a (possibly narrower-than-64-bit) known value the way loading it
/// into a 64-bit register slot does: the upper bits are always zero,
/// matching the mask-based truncation the ALU uses everywhere else.
fn known_value(slot_value: u64, width: Width) -> u64 {
    alu::truncate(slot_value, width)
}

/// Computes an `Indirect` operand's effective address (`base + scale*index
/// + displacement`) if every register it reads from is Known. Shared by
/// every site that needs to know *where* an `Indirect` operand points
/// before deciding whether a load or store can fold, so there is exactly
/// one place that knows how to combine base/index/scale/displacement.
fn effective_address(state: &EmuState, addr: &Indirect) -> Option<i64> {
    if !addr.base.is_gp() && !addr.base.is_none() {
        return None;
    }
    let base = if addr.base.is_none() {
        Some(0)
    } else {
        let slot = state.register(addr.base);
        slot.is_known().then_some(slot.value)
    }?;
    let index = if addr.scale == 0 {
        Some(0)
    } else {
        let slot = state.register(addr.index);
        slot.is_known().then(|| slot.value * addr.scale as u64)
    }?;
    Some((base as i64).wrapping_add(index as i64).wrapping_add(addr.displacement))
}

/// Reads an operand's value if (and only if) it is fully Known, per the
/// emulator's restriction to register reads and private-stack memory
/// reads with a Known effective address.
fn read_known(state: &EmuState, operand: &Operand) -> Option<u64> {
    match *operand {
        Operand::Immediate { value, width } => Some(known_value(value as u64, width)),
        Operand::Register { reg, width } => {
            let slot = state.register(reg);
            slot.is_known().then(|| known_value(slot.value, width))
        }
        Operand::Indirect { addr, width } => {
            let effective = effective_address(state, &addr)?;
            let len = width.bytes().unwrap_or(8) as usize;
            let bytes = state.stack().load(effective, len).ok()?;
            if bytes.iter().any(|b| !b.known) {
                return None;
            }
            let mut value = 0u64;
            for (i, b) in bytes.iter().enumerate() {
                value |= (b.value as u64) << (8 * i);
            }
            Some(value)
        }
        Operand::None => None,
    }
}

fn write_register(state: &mut EmuState, reg: Register, value: u64, width: Width) {
    if reg.is_gp() {
        state.set_register(reg, known_value(value, width));
    }
}

fn write_register_unknown(state: &mut EmuState, reg: Register) {
    if reg.is_gp() {
        state.set_register_unknown(reg);
    }
}

fn stack_slots_for(value: u64, known: bool, byte_len: usize) -> Vec<StackSlot> {
    (0..byte_len)
        .map(|i| StackSlot {
            value: ((value >> (8 * i)) & 0xFF) as u8,
            known,
        })
        .collect()
}

/// Substitutes a Known-register `src` operand with an equal-valued
/// immediate, matching the residual-emission rule that known inputs may
/// be baked in as immediates when the ISA permits it (used by `ADD`/`SUB`
/// so e.g. `add eax, ecx` with `ecx` Known=10 residualizes as `add eax,
/// 10` instead of carrying a dead register read).
fn substitute_known_register(state: &EmuState, operand: Operand) -> Operand {
    match operand {
        Operand::Register { reg, width } => {
            let slot = state.register(reg);
            if slot.is_known() {
                Operand::immediate(width, known_value(slot.value, width) as i64)
            } else {
                operand
            }
        }
        other => other,
    }
}

/// Steps one instruction, mutating `state` and appending to `residual` as
/// the per-opcode rules in the crate's capturing-emulator design dictate.
#[tracing::instrument(skip(state, residual), fields(address = instr.address, kind = ?instr.kind))]
pub fn step(state: &mut EmuState, instr: &Instr, residual: &mut Code) -> RewriteResult<StepOutcome> {
    match instr.kind {
        InstrKind::Invalid => Err(RewriteError::InvalidInstruction { address: instr.address }),

        InstrKind::Ret => {
            // The emulator's register slots are bookkeeping, not code: a
            // Known return-register value must be materialized into a
            // real instruction here, since the emitted residual is all
            // that actually runs. Only emitted when the final return
            // value was folded all the way to a constant; otherwise the
            // residual code that already computes it at runtime suffices.
            let return_slot = state.register(crate::consts::RETURN_REGISTER);
            if return_slot.is_known() {
                let materialize = Instr::binary(
                    instr.address,
                    0,
                    InstrKind::Mov,
                    Width::W32,
                    Operand::register(Width::W32, crate::consts::RETURN_REGISTER),
                    Operand::immediate(Width::W32, known_value(return_slot.value, Width::W32) as i64),
                );
                residual.push(materialize)?;
            }
            residual.push(instr.deep_copy())?;
            tracing::trace!(address = instr.address, "ret: residual, halting");
            Ok(StepOutcome::Halt)
        }

        // PUSH/POP only move data through the emulator's private stack,
        // which has no counterpart in the specialized function's output —
        // there is no "real" stack frame to preserve. They are always
        // captured away, independent of whether the moved value is Known.
        InstrKind::Push => {
            let reg = instr.dst.register().expect("PUSH always carries a register operand");
            let width = instr.dst.width();
            let byte_len = width.bytes().unwrap_or(8) as usize;
            let slot = state.register(reg);
            let bytes = stack_slots_for(slot.value, slot.is_known(), byte_len);

            let sp = state.register(Register::Rsp).value as i64;
            let new_sp = sp - byte_len as i64;
            state.stack_mut().store(new_sp, &bytes)?;
            state.set_register(Register::Rsp, new_sp as u64);
            tracing::trace!(address = instr.address, ?reg, "push: captured");
            Ok(StepOutcome::Continue)
        }

        InstrKind::Pop => {
            let reg = instr.dst.register().expect("POP always carries a register operand");
            let width = instr.dst.width();
            let byte_len = width.bytes().unwrap_or(8) as usize;

            let sp = state.register(Register::Rsp).value as i64;
            let bytes = state.stack().load(sp, byte_len)?.to_vec();
            state.set_register(Register::Rsp, (sp + byte_len as i64) as u64);

            if bytes.iter().all(|b| b.known) {
                let mut value = 0u64;
                for (i, b) in bytes.iter().enumerate() {
                    value |= (b.value as u64) << (8 * i);
                }
                write_register(state, reg, value, width);
            } else {
                write_register_unknown(state, reg);
            }
            tracing::trace!(address = instr.address, ?reg, "pop: captured");
            Ok(StepOutcome::Continue)
        }

        InstrKind::Mov => {
            let src_known = read_known(state, &instr.src);
            // A store to an `Indirect` destination only folds when its
            // effective address is also Known; a Known value heading to an
            // Unknown address has nowhere safe to be folded into and must
            // be residualized instead (the address itself depends on a
            // runtime value, so the write can't be reasoned about here).
            let dst_addr = match instr.dst {
                Operand::Indirect { addr, .. } => Some(effective_address(state, &addr)),
                _ => None,
            };
            let dst_foldable = !matches!(dst_addr, Some(None));

            if let (Some(value), true) = (src_known, dst_foldable) {
                if let Some(reg) = instr.dst.register() {
                    write_register(state, reg, value, instr.value_type);
                }
                // Stores to memory with a Known value and a Known address
                // are folded away here: the private stack is the only
                // memory this emulator models.
                if let Operand::Indirect { width, .. } = instr.dst {
                    let effective = dst_addr.flatten().expect("dst_foldable checked Some(Some(_)) above");
                    let byte_len = width.bytes().unwrap_or(8) as usize;
                    state
                        .stack_mut()
                        .store(effective, &stack_slots_for(value, true, byte_len))?;
                }
                tracing::trace!(address = instr.address, "mov: folded");
                Ok(StepOutcome::Continue)
            } else {
                if let Some(reg) = instr.dst.register() {
                    write_register_unknown(state, reg);
                }
                residual.push(instr.deep_copy())?;
                tracing::trace!(address = instr.address, "mov: residual");
                Ok(StepOutcome::Continue)
            }
        }

        InstrKind::Add | InstrKind::Sub => {
            let dst_reg = instr.dst.register();
            let dst_known = dst_reg.map(|r| state.register(r)).filter(|s| s.is_known()).map(|s| s.value);
            let src_known = read_known(state, &instr.src);

            match (dst_known, src_known) {
                (Some(a), Some(b)) => {
                    let result = if matches!(instr.kind, InstrKind::Add) {
                        alu::fold_add(a, b, instr.value_type)
                    } else {
                        alu::fold_sub(a, b, instr.value_type)
                    };
                    let flags = if matches!(instr.kind, InstrKind::Add) {
                        alu::flags_for_add(a, b, instr.value_type)
                    } else {
                        alu::flags_for_sub(a, b, instr.value_type)
                    };
                    if let Some(reg) = dst_reg {
                        write_register(state, reg, result, instr.value_type);
                    }
                    state.set_flags(Some(flags));
                    tracing::trace!(address = instr.address, result, "alu: folded");
                    Ok(StepOutcome::Continue)
                }
                _ => {
                    if let Some(reg) = dst_reg {
                        write_register_unknown(state, reg);
                    }
                    state.set_flags(None);
                    let src = substitute_known_register(state, instr.src);
                    residual.push(Instr { src, ..*instr })?;
                    tracing::trace!(address = instr.address, "alu: residual");
                    Ok(StepOutcome::Continue)
                }
            }
        }

        InstrKind::Jcc(_) => {
            let reason_cause = match state.flags() {
                None => BailCause::UnknownFlagsAtBranch,
                Some(flags) => {
                    if let InstrKind::Jcc(cond) = instr.kind {
                        let _taken = flow::evaluate(flags, cond);
                    }
                    // Known flags still bail: this decoder only ever
                    // follows the fallthrough byte stream, so there is no
                    // decoded code for the taken arm to fold into or
                    // discard. Redirecting the decode cursor to the branch
                    // target is future work, not a semantic requirement any
                    // scenario here exercises.
                    BailCause::ConditionalBranchNotFollowed
                }
            };
            Err(RewriteError::BailOut {
                reason: BailReason {
                    address: instr.address,
                    kind: instr.kind,
                    detail: reason_cause,
                },
            })
        }

        InstrKind::Leave => {
            // LEAVE (`mov rsp, rbp; pop rbp`) is passthrough with
            // `StateChange::DstDynamic`: the emulator does not fold it, so
            // `rbp` always becomes Unknown and the instruction is always
            // emitted verbatim.
            write_register_unknown(state, Register::Rbp);
            state.set_register_unknown(Register::Rsp);
            residual.push(instr.deep_copy())?;
            Ok(StepOutcome::Continue)
        }

        // Every other decoded kind carries a `Passthrough` annotation (or,
        // for `Nop`, is trivially stateless) and is always re-emitted
        // verbatim; only a `DstDynamic` hint changes emulator state.
        _ => {
            if let Some(passthrough) = instr.passthrough {
                if passthrough.state_change == StateChange::DstDynamic {
                    if let Some(reg) = instr.dst.register() {
                        write_register_unknown(state, reg);
                    }
                }
            }
            residual.push(instr.deep_copy())?;
            tracing::trace!(address = instr.address, kind = ?instr.kind, "passthrough: residual");
            Ok(StepOutcome::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrw_asm::{Instr, InstrKind};
    use xrw_types::{Register, Width};

    fn fresh_state() -> EmuState {
        EmuState::new(256)
    }

    #[test]
    fn add_folds_when_both_sides_known() {
        let mut state = fresh_state();
        state.set_register(Register::Rax, 3);
        state.set_register(Register::Rcx, 4);
        let instr = Instr::binary(
            0,
            2,
            InstrKind::Add,
            Width::W32,
            Operand::register(Width::W32, Register::Rax),
            Operand::register(Width::W32, Register::Rcx),
        );
        let mut residual = Code::with_capacity(4);
        step(&mut state, &instr, &mut residual).unwrap();
        assert!(residual.is_empty());
        assert_eq!(state.register(Register::Rax).value, 7);
        assert!(state.register(Register::Rax).is_known());
    }

    #[test]
    fn add_residualizes_and_substitutes_known_src() {
        let mut state = fresh_state();
        state.set_register_unknown(Register::Rax);
        state.set_register(Register::Rcx, 10);
        let instr = Instr::binary(
            0,
            2,
            InstrKind::Add,
            Width::W32,
            Operand::register(Width::W32, Register::Rax),
            Operand::register(Width::W32, Register::Rcx),
        );
        let mut residual = Code::with_capacity(4);
        step(&mut state, &instr, &mut residual).unwrap();
        assert_eq!(residual.len(), 1);
        assert_eq!(residual.as_slice()[0].src, Operand::immediate(Width::W32, 10));
        assert!(state.register(Register::Rax).is_unknown());
    }

    #[test]
    fn push_then_pop_with_known_value_folds_away() {
        let mut state = fresh_state();
        state.set_register(Register::Rdi, 42);
        let push = Instr::unary(0, 1, InstrKind::Push, Width::W64, Operand::register(Width::W64, Register::Rdi));
        let pop = Instr::unary(1, 1, InstrKind::Pop, Width::W64, Operand::register(Width::W64, Register::Rax));
        let mut residual = Code::with_capacity(4);
        step(&mut state, &push, &mut residual).unwrap();
        step(&mut state, &pop, &mut residual).unwrap();
        assert!(residual.is_empty());
        assert_eq!(state.register(Register::Rax).value, 42);
    }

    #[test]
    fn mov_store_to_unknown_address_residualizes_instead_of_vanishing() {
        // mov [rdi], esi -- rdi Unknown (the address), esi Known=7.
        let mut state = fresh_state();
        state.set_register(Register::Rsi, 7);
        let instr = Instr::binary(
            0,
            2,
            InstrKind::Mov,
            Width::W32,
            Operand::indirect(Width::W32, xrw_asm::Indirect::new(Register::Rdi, 0)),
            Operand::register(Width::W32, Register::Rsi),
        );
        let mut residual = Code::with_capacity(4);
        step(&mut state, &instr, &mut residual).unwrap();
        assert_eq!(residual.len(), 1, "a Known value stored to an Unknown address must be residualized, not dropped");
    }

    #[test]
    fn mov_store_to_known_address_folds_into_the_stack() {
        // mov [rsp-8], esi -- rsp is always Known, esi Known=7.
        let mut state = fresh_state();
        state.set_register(Register::Rsi, 7);
        let instr = Instr::binary(
            0,
            2,
            InstrKind::Mov,
            Width::W32,
            Operand::indirect(Width::W32, xrw_asm::Indirect::new(Register::Rsp, -8)),
            Operand::register(Width::W32, Register::Rsi),
        );
        let mut residual = Code::with_capacity(4);
        step(&mut state, &instr, &mut residual).unwrap();
        assert!(residual.is_empty());
        let sp = state.register(Register::Rsp).value as i64;
        let bytes = state.stack().load(sp - 8, 4).unwrap();
        assert!(bytes.iter().all(|b| b.known));
        assert_eq!(bytes[0].value, 7);
    }

    #[test]
    fn jcc_with_unknown_flags_bails_out() {
        let mut state = fresh_state();
        let instr = Instr::unary(
            0,
            2,
            InstrKind::Jcc(xrw_asm::Condition::Equal),
            Width::None,
            Operand::immediate(Width::W8, 4),
        );
        let mut residual = Code::with_capacity(4);
        let err = step(&mut state, &instr, &mut residual).unwrap_err();
        assert!(matches!(err, RewriteError::BailOut { .. }));
    }
}
