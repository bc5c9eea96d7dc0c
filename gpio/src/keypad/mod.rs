mod config;
mod dialpad;
mod key;
mod ladder;

pub use config::*;
pub use dialpad::*;
pub use key::*;
pub use ladder::*;
