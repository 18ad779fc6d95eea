//! Pressure-set accumulation primitives.
//!
//! A pressure vector has one counter per target pressure set. Registers
//! contribute their class weight to every set their class belongs to; the
//! high-water mark is maintained eagerly on every increase.

use crate::reg::{RegClass, TargetRegInfo};
use core::fmt;

/// Increase pressure in `curr` for each set impacted by `rc`, and bump the
/// high-water mark in `max`.
pub(crate) fn increase_set_pressure(
    curr: &mut [u32],
    max: &mut [u32],
    rc: RegClass,
    tri: &dyn TargetRegInfo,
) {
    let weight = tri.class_weight(rc);
    for &pset in tri.class_pressure_sets(rc) {
        curr[pset] += weight;
        if curr[pset] > max[pset] {
            max[pset] = curr[pset];
        }
    }
}

/// Decrease pressure in `curr` for each set impacted by `rc`.
pub(crate) fn decrease_set_pressure(curr: &mut [u32], rc: RegClass, tri: &dyn TargetRegInfo) {
    let weight = tri.class_weight(rc);
    for &pset in tri.class_pressure_sets(rc) {
        debug_assert!(curr[pset] >= weight, "register pressure underflow");
        curr[pset] -= weight;
    }
}

/// Displays a pressure vector as `[ 1 0 2 ]`.
pub(crate) struct DisplayPressure<'a>(pub &'a [u32]);

impl fmt::Display for DisplayPressure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for count in self.0 {
            write!(f, " {count}")?;
        }
        write!(f, " ]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::Reg;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    struct TwoSets;

    impl TargetRegInfo for TwoSets {
        fn num_pressure_sets(&self) -> usize {
            2
        }
        fn num_regs(&self) -> usize {
            4
        }
        fn class_weight(&self, rc: RegClass) -> u32 {
            [1, 2][rc.index()]
        }
        fn class_pressure_sets(&self, rc: RegClass) -> &[usize] {
            [&[0][..], &[0, 1][..]][rc.index()]
        }
        fn minimal_phys_class(&self, _reg: Reg) -> RegClass {
            RegClass::new(0)
        }
        fn overlaps(&self, _reg: Reg) -> &[Reg] {
            &[]
        }
    }

    #[test]
    fn weighted_increase_updates_max() {
        let tri = TwoSets;
        let mut curr: Vec<u32> = vec![0, 0];
        let mut max: Vec<u32> = vec![0, 0];

        increase_set_pressure(&mut curr, &mut max, RegClass::new(1), &tri);
        assert_eq!(curr, [2, 2]);
        assert_eq!(max, [2, 2]);

        increase_set_pressure(&mut curr, &mut max, RegClass::new(0), &tri);
        assert_eq!(curr, [3, 2]);
        assert_eq!(max, [3, 2]);

        decrease_set_pressure(&mut curr, RegClass::new(1), &tri);
        assert_eq!(curr, [1, 0]);
        // The high-water mark never recedes.
        assert_eq!(max, [3, 2]);
    }

    #[test]
    fn display() {
        assert_eq!(DisplayPressure(&[1, 0, 2]).to_string(), "[ 1 0 2 ]");
    }
}
