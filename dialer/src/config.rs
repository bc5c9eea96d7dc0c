use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;
use dotenv::var;
use log::warn;
use serde::{Serialize, Deserialize};
use dialpad_gpio::keypad::DialPadConfig;

const DEFAULT_CONFIG_FILE: &str = "dialer.json";

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Timings of the dial pad driver.
    pub pad: DialPadConfig,
    /// The longest number that can be entered.
    pub max_digits: usize,
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new(DEFAULT_CONFIG_FILE));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader)
                .inspect_err(|e| warn!("Ignoring malformed config {}: {}", config_path.display(), e))
                .ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config_path = Path::new(&config_str);
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pad: DialPadConfig::default(),
            max_digits: 16,
        }
    }
}
