//! Machine-id naming.
//!
//! Ids 0 through 10 come from the ELF specification. The rest were found on
//! shipped router images, which use vendor-assigned values the registry has
//! never heard of; this is why the loader treats an unexpected machine id as
//! advisory rather than fatal.

/// Human-readable name for an `e_machine` value.
#[must_use]
pub fn machine_name(machine: u16) -> &'static str {
    match machine {
        0 => "Unknown",
        1 => "AT&T WE 32100",
        2 => "SPARC",
        3 => "Intel 80386",
        4 => "Motorola 68000",
        5 => "Motorola 88000",
        7 => "Intel 80860",
        8 => "MIPS R3000",
        10 => "MIPS R4000",
        0x19 => "7200-series router (MIPS, big-endian)",
        0x1e => "3620/3640-series router (MIPS IDT R4700, big-endian)",
        0x2b => "2600-series router (PowerPC MPC860, big-endian)",
        0x33 => "1700-series router (PowerPC MPC860, big-endian)",
        0x34 => "3660-series router (MIPS R5000, big-endian)",
        0x61 => "3725-series router (MIPS, big-endian)",
        0x66 => "2691-series router (MIPS, big-endian)",
        _ => "unregistered",
    }
}

/// Whether `machine` is one of the ids the loader expects to see on a
/// bootable kernel for the supported hardware families.
#[must_use]
pub fn is_expected_kernel_machine(machine: u16) -> bool {
    matches!(machine, 8 | 10 | 0x1e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_registered_and_vendor_ids() {
        assert_eq!(machine_name(8), "MIPS R3000");
        assert_eq!(
            machine_name(0x1e),
            "3620/3640-series router (MIPS IDT R4700, big-endian)"
        );
        assert_eq!(machine_name(0x5555), "unregistered");
    }

    #[test]
    fn vendor_ids_are_not_expected_but_still_named() {
        assert!(is_expected_kernel_machine(8));
        assert!(is_expected_kernel_machine(0x1e));
        assert!(!is_expected_kernel_machine(0x33));
    }
}
