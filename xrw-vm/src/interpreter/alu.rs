use xrw_types::Width;

/// Bit positions within the emulator's simplified flags word. Only the
/// flags the modeled opcodes (`ADD`, `SUB`, and the `Jcc` conditions they
/// feed) actually need are tracked; this is not a full x86 flags model.
pub mod flag_bits {
    pub const CF: u64 = 1 << 0;
    pub const ZF: u64 = 1 << 1;
    pub const SF: u64 = 1 << 2;
    pub const OF: u64 = 1 << 3;
}

pub fn truncate(value: u64, width: Width) -> u64 {
    value & width.mask()
}

/// Computes `a + b` truncated to `width`, matching x86's wraparound and
/// implicit zero-extension-to-64-bits-on-32-bit-destination rule.
pub fn fold_add(a: u64, b: u64, width: Width) -> u64 {
    truncate(a.wrapping_add(b), width)
}

pub fn fold_sub(a: u64, b: u64, width: Width) -> u64 {
    truncate(a.wrapping_sub(b), width)
}

fn sign_bit(value: u64, width: Width) -> bool {
    match width.bits().unwrap_or(64) {
        8 => value & 0x80 != 0,
        16 => value & 0x8000 != 0,
        32 => value & 0x8000_0000 != 0,
        _ => value & 0x8000_0000_0000_0000 != 0,
    }
}

/// Flags resulting from `a + b` at the given width, using the bits defined
/// in [`flag_bits`].
pub fn flags_for_add(a: u64, b: u64, width: Width) -> u64 {
    let result = fold_add(a, b, width);
    let mut flags = 0u64;
    if result == 0 {
        flags |= flag_bits::ZF;
    }
    if sign_bit(result, width) {
        flags |= flag_bits::SF;
    }
    let wrapped = (a & width.mask()).checked_add(b & width.mask());
    if wrapped.map(|v| v > width.mask()).unwrap_or(true) {
        flags |= flag_bits::CF;
    }
    let same_sign_operands = sign_bit(a, width) == sign_bit(b, width);
    if same_sign_operands && sign_bit(result, width) != sign_bit(a, width) {
        flags |= flag_bits::OF;
    }
    flags
}

/// Flags resulting from `a - b` at the given width.
pub fn flags_for_sub(a: u64, b: u64, width: Width) -> u64 {
    let result = fold_sub(a, b, width);
    let mut flags = 0u64;
    if result == 0 {
        flags |= flag_bits::ZF;
    }
    if sign_bit(result, width) {
        flags |= flag_bits::SF;
    }
    if (a & width.mask()) < (b & width.mask()) {
        flags |= flag_bits::CF;
    }
    let differing_sign_operands = sign_bit(a, width) != sign_bit(b, width);
    if differing_sign_operands && sign_bit(result, width) != sign_bit(a, width) {
        flags |= flag_bits::OF;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_add_truncates_to_width() {
        assert_eq!(fold_add(0xFFFF_FFFF, 1, Width::W32), 0);
        assert_eq!(fold_add(3, 4, Width::W64), 7);
    }

    #[test]
    fn flags_for_add_sets_zero_flag_on_zero_result() {
        let flags = flags_for_add(u64::MAX, 1, Width::W64);
        assert_ne!(flags & flag_bits::ZF, 0);
    }

    #[test]
    fn flags_for_sub_sets_zero_flag_on_equal_operands() {
        let flags = flags_for_sub(5, 5, Width::W32);
        assert_ne!(flags & flag_bits::ZF, 0);
        assert_eq!(flags & flag_bits::CF, 0);
    }

    #[test]
    fn flags_for_sub_sets_carry_on_borrow() {
        let flags = flags_for_sub(1, 2, Width::W32);
        assert_ne!(flags & flag_bits::CF, 0);
    }
}
