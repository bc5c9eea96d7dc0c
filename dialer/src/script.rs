//! Scripted key presses replayed on the simulated pad.

use std::time::Duration;
use thiserror::Error;
use dialpad_gpio::keypad::{DialPadConfig, Key};

/// How long a key is touched when the script does not say.
pub const DEFAULT_PRESS: Duration = Duration::from_millis(250);

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum ScriptError {
    #[error("unknown key {0:?}")]
    UnknownKey(String),
    #[error("invalid press time {0:?}")]
    InvalidPress(String),
}

/// One touch of the pad.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScriptStep {
    pub key: Key,
    pub press: Duration,
}

/// Parses a comma separated list of `key[:press_ms]` steps, e.g. `0,7,S,R:800`.
pub fn parse_script(script: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    script
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(parse_step)
        .collect()
}

fn parse_step(step: &str) -> Result<ScriptStep, ScriptError> {
    let (key_str, press) = match step.split_once(':') {
        Some((key_str, press_str)) => {
            let ms: u64 = press_str
                .trim()
                .parse()
                .map_err(|_| ScriptError::InvalidPress(press_str.to_string()))?;
            (key_str.trim(), Duration::from_millis(ms))
        }
        None => (step, DEFAULT_PRESS),
    };

    let mut chars = key_str.chars();
    let key = match (chars.next(), chars.next()) {
        (Some(c), None) => Key::from_char(c),
        _ => None,
    };
    let key = key.ok_or_else(|| ScriptError::UnknownKey(key_str.to_string()))?;

    Ok(ScriptStep { key, press })
}

/// Gets how long the pad needs after the line is let go to notice the release and go idle.
pub fn settle_time(config: &DialPadConfig) -> Duration {
    let tolerance = config.tolerance();
    let sampling = (config.debounce_delay() + tolerance) * config.samples_per_cycle as u32;
    config.recheck_delay() + tolerance + sampling
}
