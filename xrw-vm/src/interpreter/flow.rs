use xrw_asm::Condition;

use super::alu::flag_bits::{CF, OF, SF, ZF};

/// Evaluates a condition code against the emulator's simplified flags
/// word. Only the conditions reachable from `ADD`/`SUB`-derived flags
/// (the only natively-modeled flag-setting opcodes) are meaningfully
/// supported; `Parity`-family conditions always evaluate against an
/// (unset) parity bit this model does not compute, matching the scope of
/// the ALU this flows from.
pub fn evaluate(flags: u64, condition: Condition) -> bool {
    let cf = flags & CF != 0;
    let zf = flags & ZF != 0;
    let sf = flags & SF != 0;
    let of = flags & OF != 0;
    match condition {
        Condition::Overflow => of,
        Condition::NotOverflow => !of,
        Condition::Below => cf,
        Condition::AboveOrEqual => !cf,
        Condition::Equal => zf,
        Condition::NotEqual => !zf,
        Condition::BelowOrEqual => cf || zf,
        Condition::Above => !cf && !zf,
        Condition::Sign => sf,
        Condition::NotSign => !sf,
        Condition::Parity => flags & (1 << 4) != 0,
        Condition::NotParity => flags & (1 << 4) == 0,
        Condition::Less => sf != of,
        Condition::GreaterOrEqual => sf == of,
        Condition::LessOrEqual => zf || (sf != of),
        Condition::Greater => !zf && (sf == of),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_condition_follows_zero_flag() {
        assert!(evaluate(ZF, Condition::Equal));
        assert!(!evaluate(0, Condition::Equal));
    }

    #[test]
    fn less_condition_follows_sign_overflow_mismatch() {
        assert!(evaluate(SF, Condition::Less));
        assert!(!evaluate(SF | OF, Condition::Less));
    }
}
