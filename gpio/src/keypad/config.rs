use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timing and reporting settings of a [DialPad](crate::keypad::DialPad).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialPadConfig {
    /// Readings taken per voting cycle.
    pub samples_per_cycle: u8,
    /// Delay between readings of one cycle, in milliseconds.
    pub debounce_ms: u64,
    /// Delay between cycles while a key is held, in milliseconds.
    pub recheck_ms: u64,
    /// How late the scheduler may run a delayed task, in milliseconds.
    pub tolerance_ms: u64,
    /// Time a key must stay pressed before the hold listener is called, in milliseconds.
    pub hold_ms: u64,
    /// Reports every change of the current key, including from and to [Key::None]
    /// and [Key::Invalid], instead of only the changes of physical keys.
    ///
    /// [Key::None]: crate::keypad::Key::None
    /// [Key::Invalid]: crate::keypad::Key::Invalid
    pub legacy_notifications: bool,
}

impl Default for DialPadConfig {
    fn default() -> Self {
        DialPadConfig {
            samples_per_cycle: 3,
            debounce_ms: 50,
            recheck_ms: 200,
            tolerance_ms: 20,
            hold_ms: 500,
            legacy_notifications: false,
        }
    }
}

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum ConfigError {
    #[error("at least one sample per voting cycle is required")]
    NoSamples,
    #[error("the {0} delay must not be zero")]
    ZeroDelay(&'static str),
}

impl DialPadConfig {
    /// Checks that the settings describe a working pad.
    ///
    /// # Errors
    /// - `ConfigError::NoSamples` if `samples_per_cycle` is zero.
    /// - `ConfigError::ZeroDelay` if the debounce or recheck delay is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.samples_per_cycle == 0 {
            return Err(ConfigError::NoSamples);
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::ZeroDelay("debounce"));
        }
        if self.recheck_ms == 0 {
            return Err(ConfigError::ZeroDelay("recheck"));
        }
        Ok(())
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn recheck_delay(&self) -> Duration {
        Duration::from_millis(self.recheck_ms)
    }

    pub fn tolerance(&self) -> Duration {
        Duration::from_millis(self.tolerance_ms)
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}
