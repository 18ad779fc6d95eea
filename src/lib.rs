//! Instruction-level register pressure tracking.
//!
//! Schedulers and spillers working on machine code after instruction
//! selection but before register allocation need to know how many registers
//! a stretch of code keeps live at once, and of what kind. Simply counting
//! live registers is not enough:
//!
//! 1. Registers are not interchangeable. Targets group register units into
//!    *pressure sets* with independent capacities, and one register class
//!    can feed several sets at different weights.
//!
//! 2. Physical registers alias. A 32-bit subregister and its 64-bit parent
//!    occupy the same storage, so liveness and pressure must be accounted
//!    per overlap group, not per name.
//!
//! [`RegPressureTracker`] deals with both. It scans a region of one basic
//! block instruction by instruction, forward or backward, maintaining the
//! weighted pressure per pressure set together with its high-water mark,
//! and summarizing which registers are live across the region boundaries.
//! The machine IR, target register description, and optional live-interval
//! analysis are all reached through traits, so the tracker embeds in any
//! backend that can describe its registers.
//!
//! The tracker never modifies the instruction stream and never makes spill
//! or allocation decisions; it only measures.

#![deny(missing_docs)]
#![no_std]

#[allow(unused_imports)] // #[macro_use] is required for no_std
#[macro_use]
extern crate alloc;

#[cfg(feature = "std")]
#[macro_use]
extern crate std;

pub mod mir;
pub mod reg;
pub mod result;
pub mod sparse_set;
pub mod tracker;

mod operands;
mod pressure;

pub use crate::mir::{Instr, Operand};
pub use crate::reg::{
    LiveIntervals, MachineFunction, MachineRegInfo, Reg, RegClass, RegClassInfo, SlotIndex,
    TargetRegInfo,
};
pub use crate::result::{Bounds, RegisterPressure};
pub use crate::tracker::RegPressureTracker;
