//! Analog-to-digital converter interface.

use std::fmt::Debug;
use crate::{GpioResult, IrqHandler};

/// AdcDriver trait defines the interface for a single-channel ADC with a completion interrupt.
///
/// Conversions are asynchronous: [AdcDriver::start_conversion] returns right away and the
/// handler installed with [AdcDriver::on_conversion_complete] is invoked once the result
/// can be read with [AdcDriver::read_result].
pub trait AdcDriver: Debug {
    /// Applies the converter configuration.
    fn configure(&mut self, config: AdcConfig) -> GpioResult<()>;

    /// Connects the converter to its input.
    fn enable(&mut self) -> GpioResult<()>;
    /// Disconnects the converter from its input, so the pin can be used digitally.
    fn disable(&mut self) -> GpioResult<()>;

    /// Starts a single conversion.
    ///
    /// # Errors
    /// - `GpioError::Disabled` if the converter is not enabled.
    /// - `GpioError::Busy` if a conversion is already in flight.
    fn start_conversion(&mut self) -> GpioResult<()>;
    /// Reads the result of the last completed conversion.
    fn read_result(&self) -> GpioResult<u16>;

    /// Installs the conversion complete handler, replacing any previous one.
    fn on_conversion_complete(&mut self, handler: IrqHandler) -> GpioResult<()>;
}

/// Resolution of a conversion result.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AdcResolution {
    Bits8,
    #[default] Bits10,
}

impl AdcResolution {
    /// Gets the largest result a conversion can produce.
    pub const fn max_value(&self) -> u16 {
        match self {
            AdcResolution::Bits8 => 0xFF,
            AdcResolution::Bits10 => 0x3FF,
        }
    }
}

/// Prescaling applied to the analog input before conversion.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AdcInputScaling {
    /// Input is converted as is.
    #[default] Full,
    /// Input is scaled to 2/3.
    TwoThirds,
    /// Input is scaled to 1/3.
    OneThird,
}

/// Reference voltage the input is compared against.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AdcReference {
    /// Internal band gap reference.
    #[default] Internal,
    /// Supply voltage, prescaled to 1/2.
    SupplyOneHalf,
    /// Supply voltage, prescaled to 1/3.
    SupplyOneThird,
    /// External reference pin.
    External,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AdcConfig {
    pub resolution: AdcResolution,
    pub input_scaling: AdcInputScaling,
    pub reference: AdcReference,
}

impl AdcConfig {
    /// The configuration the dial pad ladder is designed for.
    ///
    /// Referencing half the supply makes the readings ratiometric, so the key levels do not
    /// drift with the battery voltage.
    pub const DIAL_PAD: AdcConfig = AdcConfig {
        resolution: AdcResolution::Bits10,
        input_scaling: AdcInputScaling::TwoThirds,
        reference: AdcReference::SupplyOneHalf,
    };
}
