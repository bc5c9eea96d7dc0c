//! Simulated peripherals for running a dial pad without hardware.
//!
//! Everything here is single-threaded and driven by [SimScheduler]'s simulated time, which
//! makes it suitable for tests and host-side demos.

mod line;
mod pin;
mod sched;

pub use line::*;
pub use pin::*;
pub use sched::*;

/// Direction a simulated pin was last switched to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinMode {
    Input,
    Output,
}
