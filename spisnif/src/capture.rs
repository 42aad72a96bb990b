/*!
Acquisition loop.

Each cycle waits for the core (by polling or by interrupt), classifies the
status register, drains and renders any pending frames, and resets the core
when it reports an error. Cancellation is only honoured while waiting: once a
drain has started it always finishes, so the FIFOs are never left half read
because of a Ctrl+C.
*/

use crate::config::{DriveMode, OutputFormat};
use anyhow::{Context, Result};
use chrono::Local;
use shared::render::{CycleReport, TextRenderer};
use shared::{
    assemble, FrameList, Readiness, ReadyWaiter, RegisterAccess, SessionLimits, SharedError, SpiSnif, Wake,
};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cooperative stop request, shared with the signal handler
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Waiting,
    Assembling,
    Rendering,
    Resetting,
}

/// Result of one pass through the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Frames were drained and rendered
    Rendered(usize),
    /// Idle status, or a wake with nothing pending
    NothingReady,
    /// The session could not be buffered and was dropped. Otherwise handled
    /// like `NothingReady`, except the core is reset in both modes since the
    /// FIFOs were left partially drained.
    SessionDropped,
    /// Out-of-range status; the core was reset
    DeviceReset(u16),
    /// Stop requested while waiting
    Cancelled,
}

/// How the loop waits for captures
pub enum Drive {
    Polling { interval: Duration },
    Blocking { waiter: ReadyWaiter, slice: Duration },
}

impl Drive {
    pub fn mode(&self) -> DriveMode {
        match self {
            Drive::Polling { .. } => DriveMode::Polling,
            Drive::Blocking { .. } => DriveMode::Blocking,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub cycles: u64,
    pub frames: u64,
    pub void_frames: u64,
    pub idle_cycles: u64,
    pub device_errors: u64,
    pub dropped_sessions: u64,
}

pub struct Acquisition<A, W> {
    dev: SpiSnif<A>,
    drive: Drive,
    format: OutputFormat,
    renderer: TextRenderer,
    out: W,
    limits: SessionLimits,
    state: LoopState,
    stats: CaptureStats,
}

impl<A: RegisterAccess, W: Write> Acquisition<A, W> {
    pub fn new(dev: SpiSnif<A>, drive: Drive, out: W) -> Self {
        Self {
            dev,
            drive,
            format: OutputFormat::Text,
            renderer: TextRenderer::default(),
            out,
            limits: SessionLimits::default(),
            state: LoopState::Idle,
            stats: CaptureStats::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat, show_hex: bool) -> Self {
        self.format = format;
        self.renderer = TextRenderer::new(show_hex);
        self
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    #[cfg(test)]
    pub fn device(&mut self) -> &mut SpiSnif<A> {
        &mut self.dev
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Run cycles until cancelled, or exactly one when `once` is set
    pub fn run(&mut self, cancel: &CancelToken, once: bool) -> Result<CaptureStats> {
        info!("🚀 Starting acquisition ({:?} mode)", self.drive.mode());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let outcome = self.run_cycle(cancel)?;
            if outcome == CycleOutcome::Cancelled || once {
                break;
            }

            if let Drive::Polling { interval } = self.drive {
                thread::sleep(interval);
            }
        }

        self.state = LoopState::Idle;
        let stats = self.stats;
        info!("📊 Acquisition final stats:");
        info!("   Cycles: {}", stats.cycles);
        info!("   Frames: {} ({} void)", stats.frames, stats.void_frames);
        info!("   Idle cycles: {}", stats.idle_cycles);
        info!("   Device errors: {}", stats.device_errors);
        info!("   Dropped sessions: {}", stats.dropped_sessions);
        Ok(stats)
    }

    /// One wait / classify / drain / render pass
    pub fn run_cycle(&mut self, cancel: &CancelToken) -> Result<CycleOutcome> {
        self.state = LoopState::Waiting;

        let readiness = match self.wait_for_capture(cancel)? {
            Some(readiness) => readiness,
            None => return Ok(CycleOutcome::Cancelled),
        };
        self.stats.cycles += 1;

        let count = match readiness {
            Readiness::DeviceError(raw) => {
                warn!("Error status : {:04X}, resetting core", raw);
                self.state = LoopState::Resetting;
                self.dev.reset();
                self.stats.device_errors += 1;
                self.state = LoopState::Waiting;
                return Ok(CycleOutcome::DeviceReset(raw));
            }
            other => match other.pending() {
                Some(count) => count,
                None => {
                    debug!("No frame captured");
                    self.nothing_ready();
                    return Ok(CycleOutcome::NothingReady);
                }
            },
        };

        info!("{} frame(s) pending", count);
        self.state = LoopState::Assembling;
        let frames = match assemble(&mut self.dev, count, self.limits) {
            Ok(frames) => frames,
            Err(SharedError::Allocation(reason)) => {
                warn!("Dropping capture session: {}", reason);
                self.stats.dropped_sessions += 1;
                // the FIFOs were left partially drained
                self.dev.reset();
                self.state = LoopState::Waiting;
                return Ok(CycleOutcome::SessionDropped);
            }
            Err(e) => return Err(e).context("Frame assembly failed"),
        };

        self.state = LoopState::Rendering;
        let rendered = self.render(frames)?;
        self.state = LoopState::Waiting;
        Ok(CycleOutcome::Rendered(rendered))
    }

    /// Returns `None` if cancelled before the core became ready
    fn wait_for_capture(&mut self, cancel: &CancelToken) -> Result<Option<Readiness>> {
        match &self.drive {
            Drive::Polling { .. } => Ok(Some(self.dev.poll_once())),
            Drive::Blocking { waiter, slice } => {
                let mut wake = self.dev.trigger_and_wait_timeout(waiter, *slice);
                loop {
                    match wake {
                        Wake::Signalled => break,
                        Wake::TimedOut if cancel.is_cancelled() => return Ok(None),
                        Wake::TimedOut => wake = waiter.wait_timeout(*slice),
                        Wake::Closed => return Err(SharedError::NotifierClosed.into()),
                    }
                }
                Ok(Some(self.dev.classify_status()))
            }
        }
    }

    fn nothing_ready(&mut self) {
        self.stats.idle_cycles += 1;
        if let Drive::Blocking { .. } = self.drive {
            // stray wake
            self.dev.reset();
        }
    }

    fn render(&mut self, frames: FrameList) -> Result<usize> {
        let count = frames.len();

        match self.format {
            OutputFormat::Text => self
                .renderer
                .render_cycle(&mut self.out, &frames)
                .context("Failed to write frame dump")?,
            OutputFormat::Json => {
                let report = CycleReport::new(self.stats.cycles, Local::now().to_rfc3339(), &frames);
                report
                    .write_line(&mut self.out)
                    .context("Failed to write frame report")?;
            }
        }

        self.stats.frames += count as u64;
        self.stats.void_frames += frames.iter().filter(|f| f.is_void()).count() as u64;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::regs::Register;
    use shared::sim::{Access, SimulatedDevice};
    use shared::{ready_flag, Frame};

    fn polling(sim: SimulatedDevice) -> Acquisition<SimulatedDevice, Vec<u8>> {
        Acquisition::new(
            SpiSnif::new(sim),
            Drive::Polling {
                interval: Duration::ZERO,
            },
            Vec::new(),
        )
    }

    fn text(acq: &Acquisition<SimulatedDevice, Vec<u8>>) -> String {
        String::from_utf8(acq.output().clone()).unwrap()
    }

    #[test]
    fn test_idle_status_reads_nothing_else() {
        let mut acq = polling(SimulatedDevice::new());
        let outcome = acq.run_cycle(&CancelToken::new()).unwrap();

        assert_eq!(outcome, CycleOutcome::NothingReady);
        assert_eq!(acq.device().access().log(), &[Access::Read(Register::Status)]);
        assert!(acq.output().is_empty());
    }

    #[test]
    fn test_device_error_resets_once() {
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame { bit_count: 16, lane_a: vec![1], lane_b: vec![2] });
        sim.force_status(0x0900);
        let mut acq = polling(sim);

        let outcome = acq.run_cycle(&CancelToken::new()).unwrap();
        assert_eq!(outcome, CycleOutcome::DeviceReset(0x0900));
        assert_eq!(acq.device().access().reset_count(), 1);
        assert_eq!(acq.device().access().fifo_reads(), 0);
        assert_eq!(acq.stats().device_errors, 1);
        assert_eq!(acq.state(), LoopState::Waiting);
    }

    #[test]
    fn test_end_to_end_two_frames() {
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame { bit_count: 16, lane_a: vec![0xF00F], lane_b: vec![0x1234] });
        sim.push_frame(&Frame {
            bit_count: 24,
            lane_a: vec![0xAAAA, 0xCC00],
            lane_b: vec![0x0000, 0xFF00],
        });
        let mut acq = polling(sim);

        let outcome = acq.run_cycle(&CancelToken::new()).unwrap();
        assert_eq!(outcome, CycleOutcome::Rendered(2));

        let sim = acq.device().access();
        assert_eq!(sim.reads_of(Register::FifoPacket), 2);
        assert_eq!(sim.reads_of(Register::FifoMosi), 3);
        assert_eq!(sim.reads_of(Register::FifoMiso), 3);

        assert_eq!(
            text(&acq),
            "2 frames captured\n\
             \npacket 0, 16 bits ->\n MOSI: 1111000000001111\n MISO: 0001001000110100\n\
             \npacket 1, 24 bits ->\n MOSI: 101010101010101011001100\n MISO: 000000000000000011111111\n"
        );
    }

    #[test]
    fn test_void_frame_in_session() {
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame::void());
        let mut acq = polling(sim);

        assert_eq!(acq.run_cycle(&CancelToken::new()).unwrap(), CycleOutcome::Rendered(1));
        assert_eq!(acq.device().access().fifo_reads(), 1);
        assert!(text(&acq).contains("packet 0, 0 bits -> <void>"));
        assert_eq!(acq.stats().void_frames, 1);
    }

    #[test]
    fn test_dropped_session_renders_nothing() {
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame { bit_count: 16, lane_a: vec![1], lane_b: vec![2] });
        sim.push_frame(&Frame { bit_count: 40, lane_a: vec![1, 2, 3], lane_b: vec![4, 5, 6] });
        let mut acq = polling(sim).with_limits(SessionLimits { max_words: 4 });

        let outcome = acq.run_cycle(&CancelToken::new()).unwrap();
        assert_eq!(outcome, CycleOutcome::SessionDropped);
        assert!(acq.output().is_empty());
        assert_eq!(acq.device().access().reset_count(), 1);
        assert_eq!(acq.stats().dropped_sessions, 1);
    }

    #[test]
    fn test_cancel_during_assembly_finishes_cycle() {
        let cancel = CancelToken::new();
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame { bit_count: 16, lane_a: vec![1], lane_b: vec![2] });
        sim.push_frame(&Frame { bit_count: 32, lane_a: vec![3, 4], lane_b: vec![5, 6] });
        let hook_cancel = cancel.clone();
        sim.set_read_hook(move |_| hook_cancel.cancel());
        let mut acq = polling(sim);

        let stats = acq.run(&cancel, false).unwrap();
        assert!(cancel.is_cancelled());
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.frames, 2);
        assert_eq!(acq.device().access().fifo_reads(), 2 + 3 * 2);
        assert!(text(&acq).contains("packet 1, 32 bits"));
        assert_eq!(acq.state(), LoopState::Idle);
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut acq = polling(SimulatedDevice::new());
        let stats = acq.run(&cancel, false).unwrap();
        assert_eq!(stats.cycles, 0);
        assert!(acq.device().access().log().is_empty());
    }

    #[test]
    fn test_run_once() {
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame { bit_count: 8, lane_a: vec![0xFF00], lane_b: vec![0] });
        let mut acq = polling(sim);
        let stats = acq.run(&CancelToken::new(), true).unwrap();
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.frames, 1);
    }

    #[test]
    fn test_blocking_mode_wakes_on_capture() {
        let (notifier, waiter) = ready_flag();
        let mut sim = SimulatedDevice::new();
        sim.attach_notifier(notifier);
        sim.push_frame(&Frame { bit_count: 4, lane_a: vec![0x5000], lane_b: vec![0xA000] });
        let mut acq = Acquisition::new(
            SpiSnif::new(sim),
            Drive::Blocking {
                waiter,
                slice: Duration::from_millis(10),
            },
            Vec::new(),
        );

        let outcome = acq.run_cycle(&CancelToken::new()).unwrap();
        assert_eq!(outcome, CycleOutcome::Rendered(1));
        assert!(acq.device().access().writes_to(Register::Control)[0] & shared::regs::control::TRIGGER != 0);
        assert!(text(&acq).contains(" MOSI: 0101\n MISO: 1010"));
    }

    #[test]
    fn test_blocking_stray_wake_resets() {
        let (notifier, waiter) = ready_flag();
        let mut acq = Acquisition::new(
            SpiSnif::new(SimulatedDevice::new()),
            Drive::Blocking {
                waiter,
                slice: Duration::from_millis(10),
            },
            Vec::new(),
        );
        notifier.signal();
        notifier.signal();

        let outcome = acq.run_cycle(&CancelToken::new()).unwrap();
        assert_eq!(outcome, CycleOutcome::NothingReady);
        assert_eq!(acq.device().access().reset_count(), 1);
        assert_eq!(acq.device().access().fifo_reads(), 0);
    }

    #[test]
    fn test_blocking_wait_observes_cancel() {
        let (_notifier, waiter) = ready_flag();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut acq = Acquisition::new(
            SpiSnif::new(SimulatedDevice::new()),
            Drive::Blocking {
                waiter,
                slice: Duration::from_millis(5),
            },
            Vec::new(),
        );

        assert_eq!(acq.run_cycle(&cancel).unwrap(), CycleOutcome::Cancelled);
        assert_eq!(acq.device().access().fifo_reads(), 0);
    }

    #[test]
    fn test_blocking_closed_source_is_error() {
        let (notifier, waiter) = ready_flag();
        drop(notifier);
        let mut acq = Acquisition::new(
            SpiSnif::new(SimulatedDevice::new()),
            Drive::Blocking {
                waiter,
                slice: Duration::from_millis(5),
            },
            Vec::new(),
        );
        assert!(acq.run_cycle(&CancelToken::new()).is_err());
    }

    #[test]
    fn test_json_output() {
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame { bit_count: 8, lane_a: vec![0xFF00], lane_b: vec![0x0F00] });
        let mut acq = polling(sim).with_format(OutputFormat::Json, false);

        acq.run_cycle(&CancelToken::new()).unwrap();
        let line = text(&acq);
        assert!(line.ends_with('\n'));
        assert!(line.contains("\"frame_count\":1"));
        assert!(line.contains("\"bits\":\"11111111\""));
        assert!(line.contains("\"words\":[\"00ff\"]"));
        assert!(line.contains("\"words\":[\"00f0\"]"));
    }

    #[test]
    fn test_hex_shows_fifo_words() {
        let mut sim = SimulatedDevice::new();
        sim.push_frame(&Frame { bit_count: 4, lane_a: vec![0xA000], lane_b: vec![0x3000] });
        let mut acq = polling(sim).with_format(OutputFormat::Text, true);

        assert_eq!(acq.run_cycle(&CancelToken::new()).unwrap(), CycleOutcome::Rendered(1));
        let out = text(&acq);
        assert!(out.contains(" MOSI: 1010 [0005]"));
        assert!(out.contains(" MISO: 0011 [000c]"));
    }
}
