//! Noise rejection for key readings.

mod vote;

pub use vote::*;
