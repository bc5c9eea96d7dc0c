//! The module for the number entry state and logic.

use log::{debug, info, warn};
use dialpad_gpio::keypad::{Key, KeyEvent};

/// Collects digits and places calls.
///
/// Digits are entered on press. `S` dials the entry, tapping `R` redials the last number and
/// holding `R` clears the entry instead.
#[derive(Debug)]
pub struct Dialer {
    /// The longest number that can be entered.
    max_digits: usize,
    /// The number being entered.
    entry: String,
    /// The last number dialed, for redial.
    last_number: Option<String>,
    /// Numbers dialed since start, oldest first.
    calls: Vec<String>,
    /// The key whose hold was already handled, so its release does nothing.
    held: Option<Key>,
}

impl Dialer {
    pub fn new(max_digits: usize) -> Self {
        Dialer {
            max_digits,
            entry: String::new(),
            last_number: None,
            calls: Vec::new(),
            held: None,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Updates the dialer with an event from the pad.
    pub fn update(&mut self, event: KeyEvent) {
        debug!("{:?}", event);
        match event {
            KeyEvent::Pressed(Key::KeyS) => {
                if self.entry.is_empty() {
                    info!("Nothing to dial.");
                } else {
                    let number = std::mem::take(&mut self.entry);
                    self.dial(number);
                }
            }
            KeyEvent::Pressed(key) => {
                let Some(c) = key.digit().and_then(|_| key.to_char()) else {
                    return;
                };
                if self.entry.len() < self.max_digits {
                    self.entry.push(c);
                    info!("Entry: {}", self.entry);
                } else {
                    warn!("Entry is full, ignoring {}.", key);
                }
            }
            KeyEvent::Hold(Key::KeyR) => {
                self.held = Some(Key::KeyR);
                self.entry.clear();
                info!("Entry cleared.");
            }
            KeyEvent::Released(Key::KeyR) => {
                if self.held.take() == Some(Key::KeyR) {
                    return;
                }
                match self.last_number.clone() {
                    Some(number) => self.dial(number),
                    None => info!("No number to redial."),
                }
            }
            KeyEvent::Released(_) | KeyEvent::Hold(_) => {
                self.held = None;
            }
        }
    }

    fn dial(&mut self, number: String) {
        info!("Dialing {}...", number);
        self.last_number = Some(number.clone());
        self.calls.push(number);
    }
}
