/*!
Human-readable and JSON dumps of captured frames.

Renderers take frames exactly as drained from the core. Bit strings are
decoded into transmit order; hex words are the raw FIFO values.
*/

use crate::frame::{Frame, Lane};
use crate::word::bit_vector;
use serde::Serialize;
use std::io::{self, Write};

/// Shown in place of a bit string for frames with no clocked bits
pub const VOID_MARKER: &str = "<void>";

/// Bits of one lane, left to right, truncated to the frame's bit count.
/// `frame` must already be normalized.
///
/// Returns `None` for a void frame.
pub fn lane_bits(frame: &Frame, lane: Lane) -> Option<String> {
    if frame.is_void() {
        return None;
    }
    let words = frame.lane(lane);
    let last = words.len().saturating_sub(1);
    let mut bits = String::with_capacity(frame.bit_count as usize);
    for (i, &word) in words.iter().enumerate() {
        let len = if i == last { frame.last_word_bits() } else { 16 };
        bits.push_str(&bit_vector(word, len));
    }
    Some(bits)
}

fn hex_words(words: &[u16]) -> Vec<String> {
    words.iter().map(|w| hex::encode(w.to_be_bytes())).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderer {
    pub show_hex: bool,
}

impl TextRenderer {
    pub fn new(show_hex: bool) -> Self {
        Self { show_hex }
    }

    /// Render one drained frame
    pub fn render_frame(&self, index: usize, frame: &Frame) -> String {
        let decoded = frame.clone().normalized();
        let mut out = format!("packet {}, {} bits ->", index, frame.bit_count);
        if frame.is_void() {
            out.push(' ');
            out.push_str(VOID_MARKER);
            return out;
        }
        for lane in [Lane::Mosi, Lane::Miso] {
            out.push_str(&format!("\n {}: ", lane.label()));
            out.push_str(&lane_bits(&decoded, lane).unwrap_or_default());
            if self.show_hex {
                out.push_str(&format!(" [{}]", hex_words(frame.lane(lane)).join(" ")));
            }
        }
        out
    }

    /// Dump one cycle: frame count line, then each frame
    pub fn render_cycle<W: Write>(&self, out: &mut W, frames: &[Frame]) -> io::Result<()> {
        match frames.len() {
            1 => writeln!(out, "1 frame captured")?,
            n => writeln!(out, "{} frames captured", n)?,
        }
        for (index, frame) in frames.iter().enumerate() {
            writeln!(out)?;
            writeln!(out, "{}", self.render_frame(index, frame))?;
        }
        out.flush()
    }
}

#[derive(Debug, Serialize)]
pub struct LaneReport {
    pub bits: String,
    pub words: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FrameReport {
    pub index: usize,
    pub bit_count: u16,
    pub void: bool,
    pub mosi: Option<LaneReport>,
    pub miso: Option<LaneReport>,
}

impl FrameReport {
    pub fn new(index: usize, frame: &Frame) -> Self {
        let decoded = frame.clone().normalized();
        let lane = |lane: Lane| {
            lane_bits(&decoded, lane).map(|bits| LaneReport {
                bits,
                words: hex_words(frame.lane(lane)),
            })
        };
        Self {
            index,
            bit_count: frame.bit_count,
            void: frame.is_void(),
            mosi: lane(Lane::Mosi),
            miso: lane(Lane::Miso),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub timestamp: String,
    pub frame_count: usize,
    pub frames: Vec<FrameReport>,
}

impl CycleReport {
    pub fn new(cycle: u64, timestamp: String, frames: &[Frame]) -> Self {
        Self {
            cycle,
            timestamp,
            frame_count: frames.len(),
            frames: frames
                .iter()
                .enumerate()
                .map(|(i, f)| FrameReport::new(i, f))
                .collect(),
        }
    }

    /// One JSON object per line
    pub fn write_line<W: Write>(&self, out: &mut W) -> crate::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}
