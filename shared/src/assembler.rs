/*!
Frame assembly.

Drains the length queue and both lane FIFOs into owned [`Frame`]s. FIFO reads
are destructive, so each register is read exactly as many times as the frame
geometry requires and strictly in order: one length, then every lane A word,
then every lane B word.

A session either returns every pending frame or fails as a whole; a partially
built list is dropped before the error is returned.
*/

use crate::device::{RegisterAccess, SpiSnif};
use crate::frame::{Frame, FrameList, Lane};
use crate::protocol::MAX_BIT_COUNT;
use crate::word::word_count;
use crate::{Result, SharedError};
use tracing::{debug, warn};

/// Upper bound on the words held by one session, across both lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_words: usize,
}

impl SessionLimits {
    pub fn unlimited() -> Self {
        Self { max_words: usize::MAX }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        // a full status count of maximum-length frames on both lanes
        let per_lane = word_count(MAX_BIT_COUNT) * MAX_BIT_COUNT as usize;
        Self { max_words: per_lane * 2 }
    }
}

/// Drain `count` pending frames, oldest first.
///
/// Fails with [`SharedError::Allocation`] if a buffer cannot be obtained or
/// the session would exceed `limits`. The FIFOs are then left partially
/// drained; the caller must reset the core before the next capture.
pub fn assemble<A: RegisterAccess>(
    dev: &mut SpiSnif<A>,
    count: u16,
    limits: SessionLimits,
) -> Result<FrameList> {
    let mut frames = FrameList::new();
    frames.try_reserve_exact(count as usize)?;

    let mut used_words = 0usize;

    for index in 0..count {
        let bit_count = dev.pop_packet_length();
        if bit_count == 0 {
            debug!("Frame {} is void", index);
            frames.push(Frame::void());
            continue;
        }

        let words = word_count(bit_count);
        used_words = used_words.saturating_add(words * 2);
        if used_words > limits.max_words {
            warn!(
                "Frame {} needs {} words per lane, session limit {} reached",
                index, words, limits.max_words
            );
            return Err(SharedError::allocation(format!(
                "session exceeds {} words at frame {}",
                limits.max_words, index
            )));
        }

        let lane_a = drain_lane(dev, Lane::Mosi, words)?;
        let lane_b = drain_lane(dev, Lane::Miso, words)?;

        frames.push(Frame {
            bit_count,
            lane_a,
            lane_b,
        });
    }

    Ok(frames)
}

fn drain_lane<A: RegisterAccess>(dev: &mut SpiSnif<A>, lane: Lane, words: usize) -> Result<Vec<u16>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(words)?;
    for _ in 0..words {
        buf.push(dev.pop_word(lane));
    }
    Ok(buf)
}
