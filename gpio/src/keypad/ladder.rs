//! Mapping of raw ladder readings to keys.

use thiserror::Error;
use crate::adc::AdcConfig;
use crate::keypad::Key;

/// The span of conversion results produced while one key is pressed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyRange {
    pub key: Key,
    pub low: u16,
    pub high: u16,
}

impl KeyRange {
    pub const fn new(key: Key, low: u16, high: u16) -> Self {
        KeyRange { key, low, high }
    }

    /// Creates a range of `center ± spread`.
    pub const fn around(key: Key, center: u16, spread: u16) -> Self {
        KeyRange {
            key,
            low: center.saturating_sub(spread),
            high: center.saturating_add(spread),
        }
    }

    pub fn contains(&self, sample: u16) -> bool {
        (self.low..=self.high).contains(&sample)
    }

    /// Gets the reading in the middle of the range.
    pub fn nominal(&self) -> u16 {
        self.low + (self.high - self.low) / 2
    }
}

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LadderError {
    #[error("range table is empty")]
    Empty,
    #[error("range {index} has its low bound above its high bound")]
    Inverted { index: usize },
    #[error("range {index} overlaps or precedes the range before it")]
    Unordered { index: usize },
    #[error("key {0:?} is mapped by more than one range")]
    Duplicate(Key),
    #[error("the last range must map to the line at rest, not {0:?}")]
    NoRestRange(Key),
}

/// Half-width of the stock ranges at the low end of the ladder.
const WIDE: u16 = 5;
/// Half-width of the stock ranges at the dense top end of the ladder.
const NARROW: u16 = 3;

/// Readings of the stock pad ladder under [AdcConfig::DIAL_PAD].
///
/// The rest range runs up to the converter's largest result.
const STOCK_RANGES: [KeyRange; 13] = [
    KeyRange::around(Key::KeyS, 5, WIDE),
    KeyRange::around(Key::Key1, 30, WIDE),
    KeyRange::around(Key::Key4, 55, WIDE),
    KeyRange::around(Key::Key7, 76, WIDE),
    KeyRange::around(Key::Key0, 93, WIDE),
    KeyRange::around(Key::Key2, 109, WIDE),
    KeyRange::around(Key::Key5, 122, WIDE),
    KeyRange::around(Key::Key8, 135, NARROW),
    KeyRange::around(Key::KeyR, 145, NARROW),
    KeyRange::around(Key::Key3, 154, NARROW),
    KeyRange::around(Key::Key6, 163, NARROW),
    KeyRange::around(Key::Key9, 171, NARROW),
    KeyRange::new(Key::None, 181, AdcConfig::DIAL_PAD.resolution.max_value()),
];

/// An ordered table of non-overlapping [KeyRange]s covering the ladder's output.
///
/// Readings in the gaps between ranges are noise and classify as [Key::Invalid]. The last
/// range is the line at rest and maps to [Key::None].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RangeTable {
    ranges: Vec<KeyRange>,
}

impl Default for RangeTable {
    fn default() -> Self {
        RangeTable { ranges: STOCK_RANGES.to_vec() }
    }
}

impl RangeTable {
    /// Creates a table from ranges sorted by ascending reading.
    ///
    /// # Errors
    /// - `LadderError::Empty` if no ranges are given.
    /// - `LadderError::Inverted` if a range has `low > high`.
    /// - `LadderError::Unordered` if a range does not start above the end of the previous one.
    /// - `LadderError::Duplicate` if a key is mapped twice.
    /// - `LadderError::NoRestRange` if the last range does not map to [Key::None].
    pub fn new(ranges: Vec<KeyRange>) -> Result<Self, LadderError> {
        let last = ranges.last().ok_or(LadderError::Empty)?;
        if last.key != Key::None {
            return Err(LadderError::NoRestRange(last.key));
        }

        let mut seen = [false; Key::COUNT];
        for (index, range) in ranges.iter().enumerate() {
            if range.low > range.high {
                return Err(LadderError::Inverted { index });
            }
            if index > 0 && range.low <= ranges[index - 1].high {
                return Err(LadderError::Unordered { index });
            }
            if std::mem::replace(&mut seen[range.key.index()], true) {
                return Err(LadderError::Duplicate(range.key));
            }
        }

        Ok(RangeTable { ranges })
    }

    pub fn ranges(&self) -> &[KeyRange] {
        &self.ranges
    }

    /// Gets the range mapped to `key`, if any.
    pub fn range_of(&self, key: Key) -> Option<&KeyRange> {
        self.ranges.iter().find(|range| range.key == key)
    }

    /// Gets the reading in the middle of the range mapped to `key`.
    pub fn nominal(&self, key: Key) -> Option<u16> {
        self.range_of(key).map(KeyRange::nominal)
    }

    /// Classifies a raw reading.
    ///
    /// Starts at the middle of the table and walks towards the reading one range at a time.
    /// Stepping over a gap that contains the reading, or off either end of the table, yields
    /// [Key::Invalid]; noise between two keys is never attributed to the nearer one.
    pub fn classify(&self, sample: u16) -> Key {
        let len = self.ranges.len();
        let mut index = len / 2;

        loop {
            let range = &self.ranges[index];
            if sample < range.low {
                let Some(prev) = index.checked_sub(1) else {
                    return Key::Invalid;
                };
                index = prev;
                if sample > self.ranges[index].high {
                    return Key::Invalid;
                }
            } else if sample > range.high {
                index += 1;
                if index >= len || sample < self.ranges[index].low {
                    return Key::Invalid;
                }
            } else {
                return range.key;
            }
        }
    }
}
