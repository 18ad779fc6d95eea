//! The summarized pressure result for a traversed region.
//!
//! The result carries the high-water pressure vector, the live-in and
//! live-out register lists, and the two region boundaries. Boundaries come
//! in two shapes, fixed when the tracker is constructed: slot indexes when
//! a live-interval analysis is driving the traversal, raw instruction
//! positions otherwise. A boundary holding a mark is *closed*; clearing the
//! mark *opens* it again, discarding the matching live list.

use crate::pressure::decrease_set_pressure;
use crate::reg::{Reg, RegClass, SlotIndex, TargetRegInfo};
use alloc::vec::Vec;
use smallvec::SmallVec;

/// Region boundary marks, in one of the two shapes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Bounds {
    /// Boundaries as slot indexes from the live-interval analysis.
    Interval {
        /// Slot of the first instruction in the region, once closed.
        top: Option<SlotIndex>,
        /// Slot just past the last instruction in the region, once closed.
        bottom: Option<SlotIndex>,
    },
    /// Boundaries as instruction positions in the block.
    Region {
        /// Position of the first instruction in the region, once closed.
        top: Option<usize>,
        /// Position just past the last instruction in the region, once
        /// closed.
        bottom: Option<usize>,
    },
}

/// Pressure summary for one region of a basic block.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RegisterPressure {
    /// High-water pressure per pressure set, over the traversed region.
    pub max_pressure: Vec<u32>,
    /// Registers live at the region top, sorted and duplicate-free.
    pub live_in: SmallVec<[Reg; 8]>,
    /// Registers live at the region bottom, sorted and duplicate-free.
    pub live_out: SmallVec<[Reg; 8]>,
    bounds: Bounds,
}

impl RegisterPressure {
    /// Create a result with open boundaries and a zeroed pressure vector of
    /// length `num_pressure_sets`.
    pub fn new(require_intervals: bool, num_pressure_sets: usize) -> Self {
        let bounds = if require_intervals {
            Bounds::Interval {
                top: None,
                bottom: None,
            }
        } else {
            Bounds::Region {
                top: None,
                bottom: None,
            }
        };
        Self {
            max_pressure: vec![0; num_pressure_sets],
            live_in: SmallVec::new(),
            live_out: SmallVec::new(),
            bounds,
        }
    }

    /// Clear the result for another round of tracking: open both
    /// boundaries, drop the live lists, zero the high-water mark.
    pub fn reset(&mut self) {
        self.bounds = match self.bounds {
            Bounds::Interval { .. } => Bounds::Interval {
                top: None,
                bottom: None,
            },
            Bounds::Region { .. } => Bounds::Region {
                top: None,
                bottom: None,
            },
        };
        self.max_pressure.iter_mut().for_each(|p| *p = 0);
        self.live_in.clear();
        self.live_out.clear();
    }

    /// The boundary marks.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Does the result hold a top boundary (and with it the live-ins)?
    pub fn is_top_closed(&self) -> bool {
        match self.bounds {
            Bounds::Interval { top, .. } => top.is_some(),
            Bounds::Region { top, .. } => top.is_some(),
        }
    }

    /// Does the result hold a bottom boundary (and with it the live-outs)?
    pub fn is_bottom_closed(&self) -> bool {
        match self.bounds {
            Bounds::Interval { bottom, .. } => bottom.is_some(),
            Bounds::Region { bottom, .. } => bottom.is_some(),
        }
    }

    /// Open the top unless it is already at or above `next_top`.
    ///
    /// Receding onto a slot above the recorded top grows the region past
    /// it, so the boundary and its live-ins are stale; a top at or above
    /// the new slot is still valid and the summary is kept.
    pub fn open_top_idx(&mut self, next_top: SlotIndex) {
        match &mut self.bounds {
            Bounds::Interval { top, .. } => {
                if let Some(t) = *top {
                    if t > next_top {
                        *top = None;
                        self.live_in.clear();
                    }
                }
            }
            Bounds::Region { .. } => panic!("slot mark on a region-bounded result"),
        }
    }

    /// Open the top if it sits exactly at `prev_top`, the cursor position
    /// about to be receded across.
    pub fn open_top_pos(&mut self, prev_top: usize) {
        match &mut self.bounds {
            Bounds::Region { top, .. } => {
                if *top == Some(prev_top) {
                    *top = None;
                    self.live_in.clear();
                }
            }
            Bounds::Interval { .. } => panic!("position mark on an interval-bounded result"),
        }
    }

    /// Open the bottom unless it is strictly below `prev_bottom`.
    ///
    /// Advancing onto the recorded bottom slot extends the region across
    /// it, invalidating the boundary and its live-outs.
    pub fn open_bottom_idx(&mut self, prev_bottom: SlotIndex) {
        match &mut self.bounds {
            Bounds::Interval { bottom, .. } => {
                if let Some(b) = *bottom {
                    if b <= prev_bottom {
                        *bottom = None;
                        self.live_out.clear();
                    }
                }
            }
            Bounds::Region { .. } => panic!("slot mark on a region-bounded result"),
        }
    }

    /// Open the bottom if it sits exactly at `prev_bottom`, the cursor
    /// position about to be advanced across.
    pub fn open_bottom_pos(&mut self, prev_bottom: usize) {
        match &mut self.bounds {
            Bounds::Region { bottom, .. } => {
                if *bottom == Some(prev_bottom) {
                    *bottom = None;
                    self.live_out.clear();
                }
            }
            Bounds::Interval { .. } => panic!("position mark on an interval-bounded result"),
        }
    }

    pub(crate) fn set_top_idx(&mut self, idx: SlotIndex) {
        match &mut self.bounds {
            Bounds::Interval { top, .. } => *top = Some(idx),
            Bounds::Region { .. } => panic!("slot mark on a region-bounded result"),
        }
    }

    pub(crate) fn set_top_pos(&mut self, pos: usize) {
        match &mut self.bounds {
            Bounds::Region { top, .. } => *top = Some(pos),
            Bounds::Interval { .. } => panic!("position mark on an interval-bounded result"),
        }
    }

    pub(crate) fn set_bottom_idx(&mut self, idx: SlotIndex) {
        match &mut self.bounds {
            Bounds::Interval { bottom, .. } => *bottom = Some(idx),
            Bounds::Region { .. } => panic!("slot mark on a region-bounded result"),
        }
    }

    pub(crate) fn set_bottom_pos(&mut self, pos: usize) {
        match &mut self.bounds {
            Bounds::Region { bottom, .. } => *bottom = Some(pos),
            Bounds::Interval { .. } => panic!("position mark on an interval-bounded result"),
        }
    }

    /// Credit one register of class `rc` directly to the high-water mark.
    ///
    /// Used when a register is discovered to cross a region boundary: it
    /// was live over the whole traversed prefix or suffix, so the mark must
    /// reflect it even though the current pressure never did.
    pub fn increase(&mut self, rc: RegClass, tri: &dyn TargetRegInfo) {
        increase_max_only(&mut self.max_pressure, rc, tri);
    }

    /// Remove one register of class `rc` directly from the high-water mark.
    pub fn decrease(&mut self, rc: RegClass, tri: &dyn TargetRegInfo) {
        decrease_set_pressure(&mut self.max_pressure, rc, tri);
    }
}

/// Bump the mark vector by `rc`'s weight in each of its pressure sets.
fn increase_max_only(max: &mut [u32], rc: RegClass, tri: &dyn TargetRegInfo) {
    let weight = tri.class_weight(rc);
    for &pset in tri.class_pressure_sets(rc) {
        max[pset] += weight;
    }
}
