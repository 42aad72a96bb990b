/*!
Register access to the spisnif core.

[`RegisterAccess`] is the only seam that touches hardware. [`MappedWindow`]
implements it over a `/dev/mem` mapping; [`crate::sim::SimulatedDevice`]
implements it in software. [`SpiSnif`] layers the named register operations
and the readiness protocol on top of either.
*/

use crate::frame::Lane;
use crate::notify::{ReadyWaiter, Wake};
use crate::readiness::{BusConfig, Readiness};
use crate::regs::{control, Register, RegisterMap, PACKET_LENGTH_MASK};
use crate::{Result, SharedError};
use memmap2::{MmapOptions, MmapRaw};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 16-bit access to the named registers of one core.
///
/// Not reentrant: callers serialize all access to one device.
pub trait RegisterAccess {
    fn read(&mut self, reg: Register) -> u16;
    fn write(&mut self, reg: Register, value: u16);
}

impl<A: RegisterAccess + ?Sized> RegisterAccess for &mut A {
    fn read(&mut self, reg: Register) -> u16 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Register, value: u16) {
        (**self).write(reg, value)
    }
}

impl<A: RegisterAccess + ?Sized> RegisterAccess for Box<A> {
    fn read(&mut self, reg: Register) -> u16 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Register, value: u16) {
        (**self).write(reg, value)
    }
}

/// Physical FPGA window mapped from a memory device node.
///
/// The mapping and the file handle are released together on drop.
pub struct MappedWindow {
    map: MmapRaw,
    regs: RegisterMap,
    _file: File,
}

impl MappedWindow {
    /// Map `len` bytes at physical address `phys_addr` of `path` (usually `/dev/mem`)
    pub fn open<P: AsRef<Path>>(path: P, phys_addr: u64, len: usize, regs: RegisterMap) -> Result<Self> {
        regs.validate(len)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path.as_ref())?;

        let map = MmapOptions::new().offset(phys_addr).len(len).map_raw(&file)?;

        info!(
            "🗺️ Mapped {:#x} bytes at {:#010x} from {}",
            len,
            phys_addr,
            path.as_ref().display()
        );

        Ok(Self { map, regs, _file: file })
    }

    fn slot(&self, reg: Register) -> *mut u16 {
        let addr = self.regs.address(reg);
        debug_assert!(addr % 2 == 0 && addr + 2 <= self.map.len());
        // SAFETY: `open` validated every register address against the mapped length
        unsafe { self.map.as_mut_ptr().add(addr) as *mut u16 }
    }
}

impl RegisterAccess for MappedWindow {
    fn read(&mut self, reg: Register) -> u16 {
        // SAFETY: aligned, in-bounds pointer into a live device mapping
        unsafe { ptr::read_volatile(self.slot(reg)) }
    }

    fn write(&mut self, reg: Register, value: u16) {
        // SAFETY: aligned, in-bounds pointer into a live device mapping
        unsafe { ptr::write_volatile(self.slot(reg), value) }
    }
}

/// Typed handle on one spisnif core
pub struct SpiSnif<A> {
    regs: A,
}

impl<A: RegisterAccess> SpiSnif<A> {
    pub fn new(regs: A) -> Self {
        Self { regs }
    }

    pub fn access(&self) -> &A {
        &self.regs
    }

    pub fn access_mut(&mut self) -> &mut A {
        &mut self.regs
    }

    pub fn control(&mut self) -> u16 {
        self.regs.read(Register::Control)
    }

    pub fn set_control(&mut self, value: u16) {
        self.regs.write(Register::Control, value)
    }

    pub fn status(&mut self) -> u16 {
        self.regs.read(Register::Status)
    }

    pub fn config(&mut self) -> u16 {
        self.regs.read(Register::Config)
    }

    pub fn set_config(&mut self, value: u16) {
        self.regs.write(Register::Config, value)
    }

    pub fn id(&mut self) -> u16 {
        self.regs.read(Register::Id)
    }

    pub fn prescaler(&mut self) -> u16 {
        self.regs.read(Register::Prescaler)
    }

    pub fn set_prescaler(&mut self, value: u16) {
        self.regs.write(Register::Prescaler, value)
    }

    /// Pop the next packet length off the length queue
    pub fn pop_packet_length(&mut self) -> u16 {
        let raw = self.regs.read(Register::FifoPacket);
        if raw & !PACKET_LENGTH_MASK != 0 {
            warn!("Packet length {:#06x} exceeds 11 bits, masking", raw);
        }
        raw & PACKET_LENGTH_MASK
    }

    /// Pop the next word off one lane FIFO
    pub fn pop_word(&mut self, lane: Lane) -> u16 {
        match lane {
            Lane::Mosi => self.regs.read(Register::FifoMosi),
            Lane::Miso => self.regs.read(Register::FifoMiso),
        }
    }

    /// Pulse the reset bit, leaving the other control fields as they were
    pub fn reset(&mut self) {
        let ctrl = self.control() & !(control::RESET | control::TRIGGER);
        self.set_control(ctrl | control::RESET);
        self.set_control(ctrl);
        debug!("Core reset");
    }

    /// Write bus polarity/phase flags, then reset so the core picks them up
    pub fn configure(&mut self, bus: BusConfig) {
        info!("⚙️ Writing config {:04X}", bus.bits());
        self.set_config(bus.bits());
        self.reset();
    }

    pub fn bus_config(&mut self) -> BusConfig {
        BusConfig::from_bits(self.config())
    }

    /// Read the status register once. Never touches the FIFOs.
    pub fn classify_status(&mut self) -> Readiness {
        Readiness::from_status(self.status())
    }

    /// Interval-driven check; no trigger is written
    pub fn poll_once(&mut self) -> Readiness {
        self.classify_status()
    }

    /// Arm the core for the next capture
    pub fn trigger(&mut self) {
        let ctrl = self.control();
        self.set_control(ctrl | control::TRIGGER);
    }

    /// Arm the core and block until the capture-done notification arrives
    pub fn trigger_and_wait(&mut self, waiter: &ReadyWaiter) -> Wake {
        self.trigger();
        waiter.wait()
    }

    /// Same as [`SpiSnif::trigger_and_wait`] but gives up after `timeout`
    pub fn trigger_and_wait_timeout(&mut self, waiter: &ReadyWaiter, timeout: Duration) -> Wake {
        self.trigger();
        waiter.wait_timeout(timeout)
    }

    pub fn oversampling(&mut self) -> u8 {
        ((self.control() & control::OVERSAMPLING) >> control::OVERSAMPLING_SHIFT) as u8
    }

    pub fn set_oversampling(&mut self, value: u8) -> Result<()> {
        if value > control::OVERSAMPLING_MAX {
            return Err(SharedError::invalid_argument(format!(
                "oversampling {} out of range 0..={}",
                value,
                control::OVERSAMPLING_MAX
            )));
        }
        let ctrl = self.control() & !control::OVERSAMPLING;
        self.set_control(ctrl | ((value as u16) << control::OVERSAMPLING_SHIFT));
        Ok(())
    }

    pub fn ext_trigger(&mut self) -> u8 {
        ((self.control() & control::EXT_TRIG_NUM) >> control::EXT_TRIG_SHIFT) as u8
    }

    pub fn set_ext_trigger(&mut self, input: u8) -> Result<()> {
        if input > control::EXT_TRIG_MAX {
            return Err(SharedError::invalid_argument(format!(
                "external trigger {} out of range 0..={}",
                input,
                control::EXT_TRIG_MAX
            )));
        }
        let ctrl = self.control() & !control::EXT_TRIG_NUM;
        self.set_control(ctrl | ((input as u16) << control::EXT_TRIG_SHIFT));
        Ok(())
    }

    pub fn ext_trigger_inverted(&mut self) -> bool {
        self.control() & control::EXT_TRIG_INV != 0
    }

    pub fn set_ext_trigger_inverted(&mut self, inverted: bool) {
        let ctrl = self.control() & !control::EXT_TRIG_INV;
        self.set_control(ctrl | ((inverted as u16) << control::EXT_TRIG_INV_SHIFT));
    }

    /// Acknowledge the FIFOs. Shares its bit with reset; the bit is left set
    /// as the core expects, so follow with [`SpiSnif::reset`] to release it.
    pub fn ack_fifo(&mut self) {
        let ctrl = self.control();
        self.set_control(ctrl | control::ACK_FIFO);
    }

    /// Snapshot every register whose read has no side effect
    pub fn dump(&mut self) -> Vec<(Register, u16)> {
        Register::ALL
            .iter()
            .filter(|reg| !reg.is_destructive())
            .map(|&reg| (reg, self.regs.read(reg)))
            .collect()
    }
}
