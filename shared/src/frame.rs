/*!
Frame data structures.

A frame is one chip-select assertion as seen by the core: a bit count and the
words captured on both lanes.
*/

use crate::word::{last_word_bits, normalize, word_count};
use serde::{Deserialize, Serialize};

/// One of the two simultaneously captured bus directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lane {
    /// Lane A
    Mosi,
    /// Lane B
    Miso,
}

impl Lane {
    pub fn label(self) -> &'static str {
        match self {
            Lane::Mosi => "MOSI",
            Lane::Miso => "MISO",
        }
    }
}

/// Captured bus transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub bit_count: u16,
    pub lane_a: Vec<u16>,
    pub lane_b: Vec<u16>,
}

impl Frame {
    /// Chip-select assertion with no clocked bits
    pub fn void() -> Self {
        Self {
            bit_count: 0,
            lane_a: Vec::new(),
            lane_b: Vec::new(),
        }
    }

    pub fn is_void(&self) -> bool {
        self.bit_count == 0
    }

    /// Words each lane must hold for this frame's bit count
    pub fn word_count(&self) -> usize {
        word_count(self.bit_count)
    }

    /// Valid bits in the final word of each lane
    pub fn last_word_bits(&self) -> usize {
        last_word_bits(self.bit_count)
    }

    pub fn lane(&self, lane: Lane) -> &[u16] {
        match lane {
            Lane::Mosi => &self.lane_a,
            Lane::Miso => &self.lane_b,
        }
    }

    /// Both lanes hold exactly `word_count()` words
    pub fn is_consistent(&self) -> bool {
        let words = self.word_count();
        self.lane_a.len() == words && self.lane_b.len() == words
    }

    /// Convert every word to transmit order. Bit count is untouched.
    pub fn normalized(mut self) -> Self {
        for word in self.lane_a.iter_mut().chain(self.lane_b.iter_mut()) {
            *word = normalize(*word);
        }
        self
    }
}

/// Frames drained from one status read, oldest first
pub type FrameList = Vec<Frame>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_frame() {
        let frame = Frame::void();
        assert!(frame.is_void());
        assert_eq!(frame.word_count(), 0);
        assert!(frame.is_consistent());
        assert!(frame.lane(Lane::Mosi).is_empty());
    }

    #[test]
    fn test_frame_geometry() {
        let frame = Frame {
            bit_count: 24,
            lane_a: vec![0x1234, 0x00FF],
            lane_b: vec![0xFFFF, 0x0000],
        };
        assert_eq!(frame.word_count(), 2);
        assert_eq!(frame.last_word_bits(), 8);
        assert!(frame.is_consistent());

        let short = Frame { lane_b: vec![0xFFFF], ..frame };
        assert!(!short.is_consistent());
    }

    #[test]
    fn test_normalized_keeps_bit_count() {
        let frame = Frame {
            bit_count: 16,
            lane_a: vec![0x1234],
            lane_b: vec![0x0001],
        }
        .normalized();
        assert_eq!(frame.bit_count, 16);
        assert_eq!(frame.lane_a, vec![0x2C48]);
        assert_eq!(frame.lane_b, vec![0x8000]);
    }
}
