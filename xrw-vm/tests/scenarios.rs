//! End-to-end specialization scenarios, run against the public API the
//! way a caller embedding this crate would: decode real machine code
//! bytes, specialize, and actually call the emitted function pointer.

use xrw_vm::{specialize, ArgValue, RewriteError, SpecializeOptions};

/// `push rbp; mov rbp,rsp; mov eax,edi; pop rbp; ret` — returns its first
/// argument unchanged.
const IDENTITY: [u8; 8] = [0x55, 0x48, 0x89, 0xE5, 0x89, 0xF8, 0x5D, 0xC3];

#[test]
fn identity_function_returns_its_argument_when_unknown() {
    let specialized = specialize(IDENTITY.as_ptr(), &[ArgValue::Unknown], SpecializeOptions::default())
        .expect("identity function specializes");

    let f: extern "C" fn(u64) -> u64 = unsafe { std::mem::transmute(specialized.entry_point()) };
    assert_eq!(f(41), 41);
    assert_eq!(f(0), 0);
}

/// `mov eax, edi; add eax, esi; ret` — `return a + b;`.
const ADD: [u8; 5] = [0x89, 0xF8, 0x01, 0xF0, 0xC3];

#[test]
fn constant_fold_add_computes_the_sum_at_specialize_time() {
    let specialized = specialize(
        ADD.as_ptr(),
        &[ArgValue::Known(3), ArgValue::Known(4)],
        SpecializeOptions::default(),
    )
    .expect("fully-known add specializes");

    let f: extern "C" fn() -> u64 = unsafe { std::mem::transmute(specialized.entry_point()) };
    assert_eq!(f() & 0xFFFF_FFFF, 7);
}

#[test]
fn partial_specialization_bakes_in_only_the_known_operand() {
    let specialized = specialize(
        ADD.as_ptr(),
        &[ArgValue::Unknown, ArgValue::Known(10)],
        SpecializeOptions::default(),
    )
    .expect("partially-known add specializes");

    let f: extern "C" fn(u64) -> u64 = unsafe { std::mem::transmute(specialized.entry_point()) };
    assert_eq!(f(5) & 0xFFFF_FFFF, 15);
    assert_eq!(f(100) & 0xFFFF_FFFF, 110);
}

/// A lone `nop` (unmodeled) followed by `ret`.
const NOP_THEN_RET: [u8; 2] = [0x90, 0xC3];

#[test]
fn passthrough_nop_is_preserved_byte_identically() {
    let specialized = specialize(NOP_THEN_RET.as_ptr(), &[], SpecializeOptions::default())
        .expect("nop/ret specializes");
    let bytes = unsafe { std::slice::from_raw_parts(specialized.entry_point(), 2) };
    assert_eq!(bytes, &[0x90, 0xC3]);
}

/// `push rdi; pop rax; ret`.
const PUSH_POP: [u8; 4] = [0x57, 0x58, 0xC3, 0x90];

#[test]
fn stack_round_trip_with_known_value_folds_to_a_materialized_constant() {
    let specialized = specialize(PUSH_POP.as_ptr(), &[ArgValue::Known(99)], SpecializeOptions::default())
        .expect("push/pop round trip specializes");

    let f: extern "C" fn() -> u64 = unsafe { std::mem::transmute(specialized.entry_point()) };
    assert_eq!(f() & 0xFFFF_FFFF, 99);
}

/// `je +2; ret` with no known arguments feeding flags.
const JE_THEN_RET: [u8; 3] = [0x74, 0x02, 0xC3];

#[test]
fn bail_out_on_dynamic_branch_returns_the_original_pointer_diagnostic() {
    let err = specialize(JE_THEN_RET.as_ptr(), &[], SpecializeOptions::default())
        .expect_err("an unknown-flags branch must bail out");
    match err {
        RewriteError::BailOut { reason } => {
            assert_eq!(reason.address, 0);
        }
        other => panic!("expected BailOut, got {other:?}"),
    }
}
