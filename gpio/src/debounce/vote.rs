use crate::keypad::Key;

/// Majority vote over the readings of one sampling cycle.
///
/// A bouncing contact or a noisy line yields a few stray readings; as long as they are
/// outnumbered by the stable reading, they lose the vote.
#[derive(Clone, Debug, Default)]
pub struct VoteAccumulator {
    counts: [u8; Key::COUNT],
    recorded: u8,
}

impl VoteAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes all counters, starting a new cycle.
    pub fn begin_cycle(&mut self) {
        self.counts = [0; Key::COUNT];
        self.recorded = 0;
    }

    /// Records one classified reading.
    ///
    /// [Key::Invalid] is counted like any other key.
    pub fn record(&mut self, key: Key) {
        let count = &mut self.counts[key.index()];
        *count = count.saturating_add(1);
        self.recorded = self.recorded.saturating_add(1);
    }

    /// Gets the number of readings recorded in this cycle.
    pub fn recorded(&self) -> u8 {
        self.recorded
    }

    /// Gets the number of votes `key` got in this cycle.
    pub fn count(&self, key: Key) -> u8 {
        self.counts[key.index()]
    }

    /// Gets the key with the most votes.
    ///
    /// On a tie, the key declared first in [Key] wins. An empty cycle resolves to [Key::None].
    pub fn resolve(&self) -> Key {
        let mut winner = Key::None;
        let mut best = 0;
        for key in Key::ALL {
            let count = self.counts[key.index()];
            if count > best {
                best = count;
                winner = key;
            }
        }
        winner
    }
}
