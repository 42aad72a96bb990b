/*!
Software model of the spisnif core.

Behaves like the hardware as far as the host can tell: FIFO reads pop, the
status register reports the pending frame count or the idle sentinel, and a
reset pulse flushes everything. Accesses are logged so tests can assert on
exact register traffic. The synthetic mode generates traffic on its own for
running the tool without a board.
*/

use crate::device::RegisterAccess;
use crate::frame::Frame;
use crate::notify::Notifier;
use crate::regs::{control, status, Register};
use crate::word::normalize;
use std::collections::VecDeque;
use tracing::debug;

/// Identification value reported by the model
pub const SIM_ID: u16 = 0x5AFE;

/// One logged register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(Register),
    Write(Register, u16),
}

type ReadHook = Box<dyn FnMut(Register) + Send>;

pub struct SimulatedDevice {
    control: u16,
    config: u16,
    prescaler: u16,
    packets: VecDeque<u16>,
    mosi: VecDeque<u16>,
    miso: VecDeque<u16>,
    forced_status: Option<u16>,
    log: Vec<Access>,
    logging: bool,
    resets: usize,
    notifier: Option<Notifier>,
    read_hook: Option<ReadHook>,
    synthetic: bool,
    generated: u32,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self {
            control: 0,
            config: 0,
            prescaler: 0,
            packets: VecDeque::new(),
            mosi: VecDeque::new(),
            miso: VecDeque::new(),
            forced_status: None,
            log: Vec::new(),
            logging: true,
            resets: 0,
            notifier: None,
            read_hook: None,
            synthetic: false,
            generated: 0,
        }
    }

    /// Model that captures a fresh burst of frames whenever it is idle and polled or triggered.
    /// Access logging is off since it runs unattended.
    pub fn synthetic() -> Self {
        Self {
            synthetic: true,
            logging: false,
            ..Self::new()
        }
    }

    /// Queue a capture. Words are given in transmit order and stored the way the core stores them.
    pub fn push_frame(&mut self, frame: &Frame) {
        self.packets.push_back(frame.bit_count);
        self.mosi.extend(frame.lane_a.iter().map(|&w| normalize(w)));
        self.miso.extend(frame.lane_b.iter().map(|&w| normalize(w)));
    }

    /// Queue a raw length entry without touching the data FIFOs
    pub fn push_packet_length(&mut self, bit_count: u16) {
        self.packets.push_back(bit_count);
    }

    /// Queue raw (device order) words on both lanes
    pub fn push_raw_words(&mut self, lane_a: &[u16], lane_b: &[u16]) {
        self.mosi.extend(lane_a);
        self.miso.extend(lane_b);
    }

    /// Make the status register report `value` until the next reset
    pub fn force_status(&mut self, value: u16) {
        self.forced_status = Some(value);
    }

    /// Signal `notifier` whenever the core is triggered
    pub fn attach_notifier(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    /// Run `hook` on every FIFO read
    pub fn set_read_hook<F>(&mut self, hook: F)
    where
        F: FnMut(Register) + Send + 'static,
    {
        self.read_hook = Some(Box::new(hook));
    }

    pub fn log(&self) -> &[Access] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn reads_of(&self, reg: Register) -> usize {
        self.log.iter().filter(|a| **a == Access::Read(reg)).count()
    }

    pub fn writes_to(&self, reg: Register) -> Vec<u16> {
        self.log
            .iter()
            .filter_map(|a| match a {
                Access::Write(r, v) if *r == reg => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Number of FIFO or length-queue reads so far
    pub fn fifo_reads(&self) -> usize {
        self.log
            .iter()
            .filter(|a| matches!(a, Access::Read(reg) if reg.is_destructive()))
            .count()
    }

    pub fn reset_count(&self) -> usize {
        self.resets
    }

    fn flush(&mut self) {
        self.packets.clear();
        self.mosi.clear();
        self.miso.clear();
        self.forced_status = None;
    }

    fn status_value(&self) -> u16 {
        match self.forced_status {
            Some(value) => value,
            None if self.packets.is_empty() => status::NONE_READY,
            None => self.packets.len().min(status::COUNT_LIMIT as usize - 1) as u16,
        }
    }

    /// Frame `n` of the synthetic stream: a counter pattern with varying length
    fn synthetic_frame(n: u32) -> Frame {
        let bit_count = match n % 5 {
            0 => 8,
            1 => 16,
            2 => 24,
            3 => 0,
            _ => 37,
        };
        let words = crate::word::word_count(bit_count);
        let seed = n as u16;
        Frame {
            bit_count,
            lane_a: (0..words as u16).map(|i| seed.wrapping_mul(0x0101).wrapping_add(i)).collect(),
            lane_b: (0..words as u16).map(|i| !seed.wrapping_add(i)).collect(),
        }
    }

    fn capture_synthetic_burst(&mut self) {
        let burst = 1 + self.generated % 3;
        for _ in 0..burst {
            let frame = Self::synthetic_frame(self.generated);
            self.push_frame(&frame);
            self.generated += 1;
        }
        debug!("Simulated core captured {} frames", burst);
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterAccess for SimulatedDevice {
    fn read(&mut self, reg: Register) -> u16 {
        if self.logging {
            self.log.push(Access::Read(reg));
        }
        if reg.is_destructive() {
            if let Some(hook) = self.read_hook.as_mut() {
                hook(reg);
            }
        }

        match reg {
            Register::Control => self.control,
            Register::Config => self.config,
            Register::Prescaler => self.prescaler,
            Register::Id => SIM_ID,
            Register::Status => {
                if self.synthetic && self.packets.is_empty() && self.forced_status.is_none() {
                    self.capture_synthetic_burst();
                }
                self.status_value()
            }
            // empty FIFOs read back as zero
            Register::FifoPacket => self.packets.pop_front().unwrap_or(0),
            Register::FifoMosi => self.mosi.pop_front().unwrap_or(0),
            Register::FifoMiso => self.miso.pop_front().unwrap_or(0),
        }
    }

    fn write(&mut self, reg: Register, value: u16) {
        if self.logging {
            self.log.push(Access::Write(reg, value));
        }

        match reg {
            Register::Control => {
                if value & control::RESET != 0 {
                    self.resets += 1;
                    self.flush();
                }
                if value & control::TRIGGER != 0 {
                    if self.synthetic && self.packets.is_empty() {
                        self.capture_synthetic_burst();
                    }
                    if !self.packets.is_empty() {
                        if let Some(notifier) = &self.notifier {
                            notifier.signal();
                        }
                    }
                }
                self.control = value;
            }
            Register::Config => self.config = value,
            Register::Prescaler => self.prescaler = value,
            // read-only
            Register::Status | Register::Id => {}
            Register::FifoPacket | Register::FifoMosi | Register::FifoMiso => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tracks_queue() {
        let mut sim = SimulatedDevice::new();
        assert_eq!(sim.read(Register::Status), status::NONE_READY);

        sim.push_frame(&Frame::void());
        sim.push_frame(&Frame { bit_count: 4, lane_a: vec![0xF000], lane_b: vec![0] });
        assert_eq!(sim.read(Register::Status), 2);

        sim.write(Register::Control, control::RESET);
        assert_eq!(sim.read(Register::Status), status::NONE_READY);
        assert_eq!(sim.reset_count(), 1);
    }

    #[test]
    fn test_words_stored_in_device_order() {
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame { bit_count: 16, lane_a: vec![0x2C48], lane_b: vec![0x8000] });
        assert_eq!(sim.read(Register::FifoPacket), 16);
        assert_eq!(sim.read(Register::FifoMosi), 0x1234);
        assert_eq!(sim.read(Register::FifoMiso), 0x0001);
        assert_eq!(sim.fifo_reads(), 3);
    }

    #[test]
    fn test_forced_status_cleared_by_reset() {
        let mut sim = SimulatedDevice::new();
        sim.force_status(0x0900);
        assert_eq!(sim.read(Register::Status), 0x0900);
        sim.write(Register::Control, control::RESET);
        assert_eq!(sim.read(Register::Status), status::NONE_READY);
    }

    #[test]
    fn test_synthetic_frames_are_consistent() {
        for n in 0..20 {
            assert!(SimulatedDevice::synthetic_frame(n).is_consistent());
        }

        let mut sim = SimulatedDevice::synthetic();
        let pending = sim.read(Register::Status);
        assert!(pending > 0 && pending < status::COUNT_LIMIT);
    }
}
