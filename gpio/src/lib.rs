//! Drivers for a resistor-ladder dial pad read through one shared analog line.
//!
//! The peripherals the pad depends on (the ADC, the edge-triggered line and the
//! cooperative scheduler) are described by the traits in this crate, so the pad
//! itself can run on real hardware or on the [sim] backend.

pub mod adc;
pub mod debounce;
pub mod keypad;
pub mod sched;
pub mod sim;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("the peripheral is disabled")]
    Disabled,
    #[error("the peripheral is busy")]
    Busy,
    #[error("error: {0}")]
    Other(String),
}

pub type GpioResult<T> = Result<T, GpioError>;

/// A handler invoked by a peripheral when its event happens.
///
/// On hardware this runs in interrupt context, so it should do no more than post
/// a task to a [Scheduler](sched::Scheduler).
pub type IrqHandler = Box<dyn FnMut()>;

/// A digital pin that can be switched between input and output.
pub trait GpioPin: Debug {
    /// Sets the pin to input mode, leaving it high-impedance.
    fn set_input_mode(&mut self) -> GpioResult<()>;
    /// Sets the pin to output mode, driving the last written level.
    fn set_output_mode(&mut self) -> GpioResult<()>;
    /// Writes the output level of the pin.
    ///
    /// Takes effect immediately in output mode, or once the pin is switched to it.
    fn write(&mut self, value: bool) -> GpioResult<()>;
}

/// A digital pin that can raise an interrupt on a falling edge.
pub trait GpioInterrupt: GpioPin {
    fn enable_interrupt(&mut self) -> GpioResult<()>;
    fn disable_interrupt(&mut self) -> GpioResult<()>;

    /// Installs the falling edge handler, replacing any previous one.
    ///
    /// The handler is only invoked while the interrupt is enabled.
    fn on_falling_edge(&mut self, handler: IrqHandler) -> GpioResult<()>;
}
