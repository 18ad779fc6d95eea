//! Instruction-level register pressure tracking.
//!
//! [`RegPressureTracker`] walks a contiguous run of instructions inside one
//! basic block, one instruction at a time, in either direction. At every
//! step it keeps the live physical and virtual register sets, the current
//! weighted pressure per pressure set, and the high-water mark over the
//! traversal. Registers found to be live across a region boundary are
//! summarized as live-ins (top) and live-outs (bottom).
//!
//! The same region traversed bottom-up by [`recede`](RegPressureTracker::recede)
//! or top-down by [`advance`](RegPressureTracker::advance) produces the same
//! high-water mark and boundary summaries, with one caveat: physical
//! registers are erased from the live set by identity, so subregister
//! aliasing can make a backward scan conservatively credit an extra
//! boundary crossing that the forward scan resolves exactly.
//!
//! When a [`LiveIntervals`] analysis is supplied, virtual use operands are
//! refined with exact kill information and boundaries are recorded as slot
//! indexes. Without it, use-kill inference is approximate: a forward scan
//! cannot tell a last use from any other use, and over-counts accordingly.
//! The two modes are deliberately kept separate.

use crate::mir::Instr;
use crate::operands::collect_operands;
use crate::pressure::{decrease_set_pressure, increase_set_pressure, DisplayPressure};
use crate::reg::{
    find_reg_alias, has_reg_alias, LiveIntervals, MachineFunction, MachineRegInfo, Reg, RegClass,
    RegClassInfo, TargetRegInfo,
};
use crate::result::RegisterPressure;
use crate::sparse_set::SparseSet;
use alloc::vec::Vec;

/// Tracks register pressure over a region of one basic block.
///
/// The tracker borrows its inputs for the duration of the traversal and
/// owns the live sets, the current pressure vector, and the region result.
pub struct RegPressureTracker<'a, I> {
    tri: &'a dyn TargetRegInfo,
    mri: &'a dyn MachineRegInfo,
    rci: &'a dyn RegClassInfo,
    lis: Option<&'a dyn LiveIntervals>,

    /// The block under analysis; the cursor is an index into it, with
    /// `block.len()` standing for the block end.
    block: &'a [I],
    pos: usize,

    /// Fixed at construction: record boundaries as slot indexes and consult
    /// the interval analysis for virtual use kills.
    require_intervals: bool,

    curr_pressure: Vec<u32>,
    live_phys: SparseSet,
    live_virt: SparseSet,
    result: RegisterPressure,
}

impl<'a, I: Instr> RegPressureTracker<'a, I> {
    /// Set up a tracker over `block` with the cursor at `pos`.
    ///
    /// The cursor is normalized past any debug values. With
    /// `require_intervals`, a [`LiveIntervals`] reference must be supplied
    /// and boundaries are slot indexes; otherwise they are instruction
    /// positions.
    pub fn init(
        mf: &'a dyn MachineFunction,
        rci: &'a dyn RegClassInfo,
        lis: Option<&'a dyn LiveIntervals>,
        block: &'a [I],
        pos: usize,
        require_intervals: bool,
    ) -> Self {
        assert!(pos <= block.len(), "cursor outside the block");
        assert!(
            !require_intervals || lis.is_some(),
            "interval pressure requires live intervals"
        );
        let tri = mf.target_reg_info();
        let mri = mf.reg_info();

        let mut pos = pos;
        while pos != block.len() && block[pos].is_debug_value() {
            pos += 1;
        }

        let num_sets = tri.num_pressure_sets();
        let mut live_phys = SparseSet::new();
        live_phys.set_universe(tri.num_regs());
        let mut live_virt = SparseSet::new();
        live_virt.set_universe(mri.num_virt_regs());

        Self {
            tri,
            mri,
            rci,
            lis,
            block,
            pos,
            require_intervals,
            curr_pressure: vec![0; num_sets],
            live_phys,
            live_virt,
            result: RegisterPressure::new(require_intervals, num_sets),
        }
    }

    /// The cursor's current position in the block.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The current pressure per pressure set.
    pub fn curr_pressure(&self) -> &[u32] {
        &self.curr_pressure
    }

    /// The region result accumulated so far.
    pub fn result(&self) -> &RegisterPressure {
        &self.result
    }

    /// Surrender the region result.
    pub fn into_result(self) -> RegisterPressure {
        self.result
    }

    /// Does the result hold a top boundary?
    pub fn is_top_closed(&self) -> bool {
        self.result.is_top_closed()
    }

    /// Does the result hold a bottom boundary?
    pub fn is_bottom_closed(&self) -> bool {
        self.result.is_bottom_closed()
    }

    fn intervals(&self) -> &'a dyn LiveIntervals {
        self.lis.expect("interval pressure requires live intervals")
    }

    fn increase_phys_pressure(&mut self, reg: Reg) {
        let rc = self.tri.minimal_phys_class(reg);
        increase_set_pressure(
            &mut self.curr_pressure,
            &mut self.result.max_pressure,
            rc,
            self.tri,
        );
    }

    fn decrease_phys_pressure(&mut self, reg: Reg) {
        let rc = self.tri.minimal_phys_class(reg);
        decrease_set_pressure(&mut self.curr_pressure, rc, self.tri);
    }

    fn increase_virt_pressure(&mut self, reg: Reg) {
        let rc = self.mri.class_of(reg);
        increase_set_pressure(
            &mut self.curr_pressure,
            &mut self.result.max_pressure,
            rc,
            self.tri,
        );
    }

    fn decrease_virt_pressure(&mut self, reg: Reg) {
        let rc = self.mri.class_of(reg);
        decrease_set_pressure(&mut self.curr_pressure, rc, self.tri);
    }

    /// Record `reg` as crossing the region top and credit the high-water
    /// mark. Skipped if the live-in list already holds it (or an alias of
    /// it, for physregs).
    fn discover_live_in(&mut self, reg: Reg) {
        let already = if reg.is_virtual() {
            debug_assert!(
                !self.live_virt.contains(reg.index() as u32),
                "live register rediscovered as live-in"
            );
            self.result.live_in.contains(&reg)
        } else {
            debug_assert!(
                !self.live_phys.contains(reg.index() as u32),
                "live register rediscovered as live-in"
            );
            find_reg_alias(reg, &self.result.live_in, self.tri).is_some()
        };
        if already {
            return;
        }

        log::trace!("{} is live in to the region", reg);
        let at = self.result.live_in.partition_point(|r| *r < reg);
        self.result.live_in.insert(at, reg);
        let rc = self.class_of(reg);
        self.result.increase(rc, self.tri);
    }

    /// Record `reg` as crossing the region bottom and credit the
    /// high-water mark.
    fn discover_live_out(&mut self, reg: Reg) {
        let already = if reg.is_virtual() {
            debug_assert!(
                !self.live_virt.contains(reg.index() as u32),
                "live register rediscovered as live-out"
            );
            self.result.live_out.contains(&reg)
        } else {
            debug_assert!(
                !self.live_phys.contains(reg.index() as u32),
                "live register rediscovered as live-out"
            );
            find_reg_alias(reg, &self.result.live_out, self.tri).is_some()
        };
        if already {
            return;
        }

        log::trace!("{} is live out of the region", reg);
        let at = self.result.live_out.partition_point(|r| *r < reg);
        self.result.live_out.insert(at, reg);
        let rc = self.class_of(reg);
        self.result.increase(rc, self.tri);
    }

    fn class_of(&self, reg: Reg) -> RegClass {
        if reg.is_virtual() {
            self.mri.class_of(reg)
        } else {
            self.tri.minimal_phys_class(reg)
        }
    }

    /// Record the cursor as the top boundary and summarize the live-ins
    /// from the current live sets.
    pub fn close_top(&mut self) {
        if self.require_intervals {
            let idx = self.intervals().instruction_index(self.pos);
            self.result.set_top_idx(idx);
        } else {
            self.result.set_top_pos(self.pos);
        }

        assert!(
            self.result.live_in.is_empty(),
            "inconsistent region live-in summary"
        );
        self.result
            .live_in
            .reserve(self.live_phys.len() + self.live_virt.len());
        for &num in &self.live_phys {
            self.result.live_in.push(Reg::phys(num));
        }
        for &index in &self.live_virt {
            self.result.live_in.push(Reg::virt(index));
        }
        self.result.live_in.sort_unstable();
        self.result.live_in.dedup();
        log::trace!("close top at {}: live in {:?}", self.pos, self.result.live_in);
    }

    /// Record the cursor as the bottom boundary and summarize the
    /// live-outs from the current live sets.
    pub fn close_bottom(&mut self) {
        if self.require_intervals {
            let idx = if self.pos == self.block.len() {
                self.intervals().block_end_index()
            } else {
                self.intervals().instruction_index(self.pos)
            };
            self.result.set_bottom_idx(idx);
        } else {
            self.result.set_bottom_pos(self.pos);
        }

        assert!(
            self.result.live_out.is_empty(),
            "inconsistent region live-out summary"
        );
        self.result
            .live_out
            .reserve(self.live_phys.len() + self.live_virt.len());
        for &num in &self.live_phys {
            self.result.live_out.push(Reg::phys(num));
        }
        for &index in &self.live_virt {
            self.result.live_out.push(Reg::virt(index));
        }
        self.result.live_out.sort_unstable();
        self.result.live_out.dedup();
        log::trace!(
            "close bottom at {}: live out {:?}",
            self.pos,
            self.result.live_out
        );
    }

    /// Finalize the region: close whichever boundary is still open.
    ///
    /// With both boundaries open the tracker never moved; that degenerate
    /// region has no marks to record, and the live sets must be empty.
    pub fn close_region(&mut self) {
        if !self.is_top_closed() && !self.is_bottom_closed() {
            assert!(
                self.live_phys.is_empty() && self.live_virt.is_empty(),
                "no region boundary"
            );
            return;
        }
        if !self.is_bottom_closed() {
            self.close_bottom();
        } else if !self.is_top_closed() {
            self.close_top();
        }
        // Both closed: nothing left to record.
    }

    /// Recede across the previous instruction, summarizing the region from
    /// the bottom upward. Returns false at the top of the analyzable
    /// region, after closing it.
    pub fn recede(&mut self) -> bool {
        if self.pos == 0 {
            self.close_region();
            return false;
        }
        if !self.is_bottom_closed() {
            self.close_bottom();
        }

        // Receding across a position-marked top grows the region past it.
        if !self.require_intervals && self.is_top_closed() {
            self.result.open_top_pos(self.pos);
        }

        // Find the previous instruction. A debug value at the block start
        // ends the traversal rather than being skipped further.
        self.pos -= 1;
        while self.pos != 0 && self.block[self.pos].is_debug_value() {
            self.pos -= 1;
        }
        if self.block[self.pos].is_debug_value() {
            self.close_region();
            return false;
        }

        let slot = if self.require_intervals {
            let slot = self.intervals().instruction_index(self.pos);
            if self.is_top_closed() {
                self.result.open_top_idx(slot);
            }
            Some(slot)
        } else {
            None
        };

        let (phys, virt) = collect_operands(&self.block[self.pos], self.tri, self.rci);

        // Boost pressure for all dead defs together: they peak at this
        // instruction and are gone on either side of it.
        for &reg in &phys.dead_defs {
            self.increase_phys_pressure(reg);
        }
        for &reg in &virt.dead_defs {
            self.increase_virt_pressure(reg);
        }
        for &reg in &phys.dead_defs {
            self.decrease_phys_pressure(reg);
        }
        for &reg in &virt.dead_defs {
            self.decrease_virt_pressure(reg);
        }

        // Kill liveness at live defs. A def of a register that is not live
        // below the cursor escapes the region bottom.
        // TODO: consider earlyclobbers?
        for &reg in &phys.defs {
            if self.live_phys.erase(reg.index() as u32) {
                self.decrease_phys_pressure(reg);
            } else {
                self.discover_live_out(reg);
            }
        }
        for &reg in &virt.defs {
            if self.live_virt.erase(reg.index() as u32) {
                self.decrease_virt_pressure(reg);
            } else {
                self.discover_live_out(reg);
            }
        }

        // Generate liveness for uses.
        for &reg in &phys.uses {
            if !has_reg_alias(reg, &self.live_phys, self.tri) {
                self.increase_phys_pressure(reg);
                self.live_phys.insert(reg.index() as u32);
            }
        }
        for &reg in &virt.uses {
            if !self.live_virt.contains(reg.index() as u32) {
                // A use that is not a kill was live below the region too.
                if let Some(slot) = slot {
                    if !self.intervals().killed_at(reg, slot) {
                        self.discover_live_out(reg);
                    }
                }
                self.increase_virt_pressure(reg);
                self.live_virt.insert(reg.index() as u32);
            }
        }

        log::trace!(
            "recede to {}: pressure {}",
            self.pos,
            DisplayPressure(&self.curr_pressure)
        );
        true
    }

    /// Advance across the current instruction, summarizing the region from
    /// the top downward. Returns false at the block end, after closing the
    /// region.
    pub fn advance(&mut self) -> bool {
        if self.pos == self.block.len() {
            self.close_region();
            return false;
        }
        if !self.is_top_closed() {
            self.close_top();
        }

        let slot = if self.require_intervals {
            Some(self.intervals().instruction_index(self.pos))
        } else {
            None
        };

        // Advancing onto the recorded bottom extends the region across it.
        if self.is_bottom_closed() {
            match slot {
                Some(slot) => self.result.open_bottom_idx(slot),
                None => self.result.open_bottom_pos(self.pos),
            }
        }

        let (phys, virt) = collect_operands(&self.block[self.pos], self.tri, self.rci);

        // Kill liveness at last uses. A use of a register that is not live
        // above the cursor was live in to the region.
        for &reg in &phys.uses {
            if !has_reg_alias(reg, &self.live_phys, self.tri) {
                self.discover_live_in(reg);
            } else {
                // Allocatable physregs are always single-use before
                // register allocation.
                self.decrease_phys_pressure(reg);
                self.live_phys.erase(reg.index() as u32);
            }
        }
        for &reg in &virt.uses {
            match slot {
                Some(slot) => {
                    if self.intervals().killed_at(reg, slot) {
                        if self.live_virt.erase(reg.index() as u32) {
                            self.decrease_virt_pressure(reg);
                        } else {
                            self.discover_live_in(reg);
                        }
                    }
                }
                None => {
                    if !self.live_virt.contains(reg.index() as u32) {
                        self.discover_live_in(reg);
                        self.increase_virt_pressure(reg);
                    }
                }
            }
        }

        // Generate liveness for defs.
        for &reg in &phys.defs {
            if !has_reg_alias(reg, &self.live_phys, self.tri) {
                self.increase_phys_pressure(reg);
                self.live_phys.insert(reg.index() as u32);
            }
        }
        for &reg in &virt.defs {
            if self.live_virt.insert(reg.index() as u32) {
                self.increase_virt_pressure(reg);
            }
        }

        // Boost pressure for all dead defs together.
        for &reg in &phys.dead_defs {
            self.increase_phys_pressure(reg);
        }
        for &reg in &virt.dead_defs {
            self.increase_virt_pressure(reg);
        }
        for &reg in &phys.dead_defs {
            self.decrease_phys_pressure(reg);
        }
        for &reg in &virt.dead_defs {
            self.decrease_virt_pressure(reg);
        }

        log::trace!(
            "advance past {}: pressure {}",
            self.pos,
            DisplayPressure(&self.curr_pressure)
        );

        // Find the next instruction.
        self.pos += 1;
        while self.pos != self.block.len() && self.block[self.pos].is_debug_value() {
            self.pos += 1;
        }
        true
    }
}
