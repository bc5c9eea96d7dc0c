use std::fmt::{Display, Formatter};

/// Represents the keys on the dial pad, plus the two readings that are not a key.
///
/// The declaration order matters: when a voting cycle ends in a tie, the key declared first wins.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    /// The `0` key.
    Key0,
    /// The `1` key.
    Key1,
    /// The `2` key.
    Key2,
    /// The `3` key.
    Key3,
    /// The `4` key.
    Key4,
    /// The `5` key.
    Key5,
    /// The `6` key.
    Key6,
    /// The `7` key.
    Key7,
    /// The `8` key.
    Key8,
    /// The `9` key.
    Key9,
    /// The `S` key.
    KeyS,
    /// The `R` key.
    KeyR,
    /// The reading fell between two key ranges or outside of the table.
    Invalid,
    /// The line is at rest, no key is touched.
    None,
}

impl Key {
    /// The number of [Key] variants, including [Key::Invalid] and [Key::None].
    pub const COUNT: usize = 14;

    /// All variants in declaration order.
    pub const ALL: [Key; Key::COUNT] = [
        Key::Key0, Key::Key1, Key::Key2, Key::Key3, Key::Key4,
        Key::Key5, Key::Key6, Key::Key7, Key::Key8, Key::Key9,
        Key::KeyS, Key::KeyR, Key::Invalid, Key::None,
    ];

    /// Gets the position of the key in declaration order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Checks whether this is a physical key rather than [Key::Invalid] or [Key::None].
    pub fn is_key(self) -> bool {
        !matches!(self, Key::Invalid | Key::None)
    }

    /// Converts a digit to its [Key].
    pub fn from_digit(digit: u8) -> Option<Key> {
        if digit < 10 {
            Some(Key::ALL[digit as usize])
        } else {
            None
        }
    }

    /// Gets the digit of a numeric key.
    pub fn digit(self) -> Option<u8> {
        match self {
            Key::KeyS | Key::KeyR | Key::Invalid | Key::None => None,
            key => Some(key.index() as u8),
        }
    }

    /// Converts a character, as printed on the pad, to its [Key].
    pub fn from_char(c: char) -> Option<Key> {
        match c.to_ascii_uppercase() {
            'S' => Some(Key::KeyS),
            'R' => Some(Key::KeyR),
            c => c.to_digit(10).and_then(|d| Key::from_digit(d as u8)),
        }
    }

    /// Converts the [Key] to the character printed on the pad.
    pub fn to_char(self) -> Option<char> {
        match self {
            Key::KeyS => Some('S'),
            Key::KeyR => Some('R'),
            key => key.digit().map(|d| (b'0' + d) as char),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_char() {
            Some(c) => write!(f, "{}", c),
            None => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_follows_declaration_order() {
        for (i, key) in Key::ALL.iter().enumerate() {
            assert_eq!(key.index(), i);
        }
        assert_eq!(Key::None.index(), Key::COUNT - 1);
    }

    #[test]
    fn chars() {
        assert_eq!(Key::from_char('7'), Some(Key::Key7));
        assert_eq!(Key::from_char('s'), Some(Key::KeyS));
        assert_eq!(Key::from_char('#'), None);
        assert_eq!(Key::KeyR.to_char(), Some('R'));
        assert_eq!(Key::Invalid.to_char(), None);
        assert_eq!(Key::Key0.to_string(), "0");
        assert_eq!(Key::None.to_string(), "None");
    }

    #[test]
    fn only_physical_keys_are_keys() {
        assert!(Key::Key9.is_key());
        assert!(Key::KeyS.is_key());
        assert!(!Key::Invalid.is_key());
        assert!(!Key::None.is_key());
    }
}
