//! Channel identity shared by switches, relays, and topics.

use core::fmt;

/// One of the two independent switch + relay + topic triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    One = 0,
    Two = 1,
}

impl Channel {
    /// Both channels, in index order.
    pub const ALL: [Channel; 2] = [Channel::One, Channel::Two];

    /// Zero-based index into per-channel arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The opposite channel.
    pub const fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Self::One),
            1 => Some(Self::Two),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "ch1"),
            Self::Two => write!(f, "ch2"),
        }
    }
}
