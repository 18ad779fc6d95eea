//! Operand classification.
//!
//! For one instruction, split the register operands into unique uses, live
//! defs, and dead defs, separately for physical and virtual registers.
//! Virtual registers deduplicate by identity; physical registers by alias,
//! so a subregister operand is absorbed by an already-collected sibling.

use crate::mir::{Instr, Operand};
use crate::reg::{find_reg, find_reg_alias, Reg, RegClassInfo, TargetRegInfo};
use smallvec::SmallVec;

/// An instruction's unique register operands, in first-seen order.
pub(crate) struct RegisterOperands {
    pub uses: SmallVec<[Reg; 8]>,
    pub defs: SmallVec<[Reg; 8]>,
    pub dead_defs: SmallVec<[Reg; 8]>,
    /// Virtual collection dedups by identity; physical by alias.
    is_vreg: bool,
}

impl RegisterOperands {
    fn new(is_vreg: bool) -> Self {
        Self {
            uses: SmallVec::new(),
            defs: SmallVec::new(),
            dead_defs: SmallVec::new(),
            is_vreg,
        }
    }

    /// Route one operand's register onto the matching lists. An operand
    /// that both reads and writes lands in `uses` and in a def list.
    fn collect(&mut self, op: &Operand, reg: Reg, tri: &dyn TargetRegInfo) {
        if op.reads {
            if find_reg(reg, self.is_vreg, &self.uses, tri).is_none() {
                self.uses.push(reg);
            }
        }
        if op.defs {
            let list = if op.dead {
                &mut self.dead_defs
            } else {
                &mut self.defs
            };
            if find_reg(reg, self.is_vreg, list, tri).is_none() {
                list.push(reg);
            }
        }
    }
}

/// Classify `inst`'s operands into physical and virtual operand sets.
///
/// Physical registers participate only if allocatable. Physical dead defs
/// that alias a live def are pruned; the instruction's real def already
/// accounts for the register's pressure at this point.
pub(crate) fn collect_operands<I: Instr>(
    inst: &I,
    tri: &dyn TargetRegInfo,
    rci: &dyn RegClassInfo,
) -> (RegisterOperands, RegisterOperands) {
    let mut phys = RegisterOperands::new(false);
    let mut virt = RegisterOperands::new(true);

    for op in inst.operands() {
        let Some(reg) = op.reg else { continue };
        if reg.is_virtual() {
            virt.collect(op, reg, tri);
        } else if rci.is_allocatable(reg) {
            phys.collect(op, reg, tri);
        }
    }

    let mut i = phys.dead_defs.len();
    while i > 0 {
        i -= 1;
        if find_reg_alias(phys.dead_defs[i], &phys.defs, tri).is_some() {
            phys.dead_defs.remove(i);
        }
    }

    (phys, virt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::RegClass;
    use alloc::vec::Vec;

    // Physical registers 1 and 2 alias (think rax/eax); 3 stands alone and
    // 4 is reserved.
    struct AliasTarget;

    const OV1: [Reg; 2] = [Reg::phys(1), Reg::phys(2)];
    const OV2: [Reg; 2] = [Reg::phys(2), Reg::phys(1)];
    const OV3: [Reg; 1] = [Reg::phys(3)];
    const OV4: [Reg; 1] = [Reg::phys(4)];

    impl TargetRegInfo for AliasTarget {
        fn num_pressure_sets(&self) -> usize {
            1
        }
        fn num_regs(&self) -> usize {
            5
        }
        fn class_weight(&self, _rc: RegClass) -> u32 {
            1
        }
        fn class_pressure_sets(&self, _rc: RegClass) -> &[usize] {
            &[0]
        }
        fn minimal_phys_class(&self, _reg: Reg) -> RegClass {
            RegClass::new(0)
        }
        fn overlaps(&self, reg: Reg) -> &[Reg] {
            match reg.index() {
                1 => &OV1,
                2 => &OV2,
                3 => &OV3,
                _ => &OV4,
            }
        }
    }

    struct AllButFour;

    impl RegClassInfo for AllButFour {
        fn is_allocatable(&self, reg: Reg) -> bool {
            reg.index() != 4
        }
    }

    struct TestInst(Vec<Operand>);

    impl Instr for TestInst {
        fn is_debug_value(&self) -> bool {
            false
        }
        fn operands(&self) -> &[Operand] {
            &self.0
        }
    }

    #[test]
    fn splits_phys_and_virt() {
        let inst = TestInst(vec![
            Operand::reg_def(Reg::virt(0)),
            Operand::reg_use(Reg::virt(1)),
            Operand::reg_use(Reg::phys(3)),
            Operand::reg_dead_def(Reg::virt(2)),
        ]);
        let (phys, virt) = collect_operands(&inst, &AliasTarget, &AllButFour);

        assert_eq!(virt.uses.as_slice(), &[Reg::virt(1)][..]);
        assert_eq!(virt.defs.as_slice(), &[Reg::virt(0)][..]);
        assert_eq!(virt.dead_defs.as_slice(), &[Reg::virt(2)][..]);
        assert_eq!(phys.uses.as_slice(), &[Reg::phys(3)][..]);
        assert!(phys.defs.is_empty() && phys.dead_defs.is_empty());
    }

    #[test]
    fn use_def_operand_counts_twice() {
        let inst = TestInst(vec![Operand::reg_use_def(Reg::virt(5))]);
        let (_, virt) = collect_operands(&inst, &AliasTarget, &AllButFour);
        assert_eq!(virt.uses.as_slice(), &[Reg::virt(5)][..]);
        assert_eq!(virt.defs.as_slice(), &[Reg::virt(5)][..]);
    }

    #[test]
    fn phys_dedup_is_by_alias() {
        // A use of 1 absorbs the aliasing use of 2; 3 is independent.
        let inst = TestInst(vec![
            Operand::reg_use(Reg::phys(1)),
            Operand::reg_use(Reg::phys(2)),
            Operand::reg_use(Reg::phys(3)),
        ]);
        let (phys, _) = collect_operands(&inst, &AliasTarget, &AllButFour);
        assert_eq!(phys.uses.as_slice(), &[Reg::phys(1), Reg::phys(3)][..]);
    }

    #[test]
    fn virt_dedup_is_by_identity() {
        let inst = TestInst(vec![
            Operand::reg_use(Reg::virt(0)),
            Operand::reg_use(Reg::virt(0)),
            Operand::reg_use(Reg::virt(1)),
        ]);
        let (_, virt) = collect_operands(&inst, &AliasTarget, &AllButFour);
        assert_eq!(virt.uses.as_slice(), &[Reg::virt(0), Reg::virt(1)][..]);
    }

    #[test]
    fn dead_def_aliasing_live_def_is_pruned() {
        let inst = TestInst(vec![
            Operand::reg_def(Reg::phys(1)),
            Operand::reg_dead_def(Reg::phys(2)),
        ]);
        let (phys, _) = collect_operands(&inst, &AliasTarget, &AllButFour);
        assert_eq!(phys.defs.as_slice(), &[Reg::phys(1)][..]);
        assert!(phys.dead_defs.is_empty());
    }

    #[test]
    fn unallocatable_and_empty_operands_are_skipped() {
        let inst = TestInst(vec![
            Operand::reg_use(Reg::phys(4)),
            Operand {
                reg: None,
                reads: true,
                defs: false,
                dead: false,
            },
        ]);
        let (phys, virt) = collect_operands(&inst, &AliasTarget, &AllButFour);
        assert!(phys.uses.is_empty());
        assert!(virt.uses.is_empty());
    }
}
