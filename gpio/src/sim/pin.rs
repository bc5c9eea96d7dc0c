use std::cell::Cell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use crate::sim::PinMode;
use crate::{GpioPin, GpioResult};

/// A simulated digital pin that records how it was driven.
///
/// Clones share the same pin, so a clone kept outside the driver can inspect it.
#[derive(Clone, Default)]
pub struct SimPin {
    mode: Rc<Cell<Option<PinMode>>>,
    level: Rc<Cell<bool>>,
}

impl Debug for SimPin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimPin({:?}, {})", self.mode.get(), self.level.get())
    }
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<PinMode> {
        self.mode.get()
    }

    /// Gets the level last written to the pin.
    pub fn level(&self) -> bool {
        self.level.get()
    }

    /// Checks whether the pin is actively driving a high level.
    pub fn is_driven_high(&self) -> bool {
        self.mode.get() == Some(PinMode::Output) && self.level.get()
    }
}

impl GpioPin for SimPin {
    fn set_input_mode(&mut self) -> GpioResult<()> {
        self.mode.set(Some(PinMode::Input));
        Ok(())
    }

    fn set_output_mode(&mut self) -> GpioResult<()> {
        self.mode.set(Some(PinMode::Output));
        Ok(())
    }

    fn write(&mut self, value: bool) -> GpioResult<()> {
        self.level.set(value);
        Ok(())
    }
}
