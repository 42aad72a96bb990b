/*!
Register map of the spisnif IP core.

All registers are 16 bits wide and addressed by byte offset from the IP base.
The offsets and masks below are the wire contract with the FPGA design and
must not drift from the HDL.
*/

use serde::{Deserialize, Serialize};

/// Offset of the spisnif IP inside the FPGA window (wishbone16 bus)
pub const IP_BASE: usize = 0x10;

pub const CONTROL: u16 = 0x00;
pub const FIFO_MOSI: u16 = 0x02;
pub const FIFO_MISO: u16 = 0x04;
pub const FIFO_PACKET: u16 = 0x06;
pub const STATUS: u16 = 0x08;
pub const CONFIG: u16 = 0x0a;
pub const ID: u16 = 0x0c;
// Placeholder slot after ID; override with `prescaler` in `[device.registers]`
pub const PRESCALER: u16 = 0x0e;

/// Control register bit masks
pub mod control {
    pub const TRIGGER: u16 = 0x0001;
    pub const EXT_TRIG_NUM: u16 = 0x003E;
    pub const OVERSAMPLING: u16 = 0x01C0;
    pub const EXT_TRIG_INV: u16 = 0x0200;
    pub const RESET: u16 = 0x8000;
    /// Same bit as [`RESET`]: the core flushes its FIFOs on reset.
    pub const ACK_FIFO: u16 = 0x8000;

    pub const EXT_TRIG_SHIFT: u16 = 1;
    pub const OVERSAMPLING_SHIFT: u16 = 6;
    pub const EXT_TRIG_INV_SHIFT: u16 = 9;

    /// Highest selectable external trigger input
    pub const EXT_TRIG_MAX: u8 = 19;
    /// Highest oversampling setting (3-bit field)
    pub const OVERSAMPLING_MAX: u8 = 7;
}

/// Config register bit masks
pub mod config {
    pub const CSPOL: u16 = 0x0004;
    pub const CPHA: u16 = 0x0002;
    pub const CPOL: u16 = 0x0001;
}

/// Status register sentinels
pub mod status {
    /// Idle: no frame captured since the last drain
    pub const NONE_READY: u16 = 0x8000;
    /// Frame counts are strictly below this value
    pub const COUNT_LIMIT: u16 = 1 << 11;
}

/// Packet length values are 11 bits wide
pub const PACKET_LENGTH_MASK: u16 = 0x07FF;

/// Named registers of the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Register {
    Control,
    FifoMosi,
    FifoMiso,
    FifoPacket,
    Status,
    Config,
    Id,
    Prescaler,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::Control,
        Register::FifoMosi,
        Register::FifoMiso,
        Register::FifoPacket,
        Register::Status,
        Register::Config,
        Register::Id,
        Register::Prescaler,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Register::Control => "SPISNIF_CONTROL_REG",
            Register::FifoMosi => "SPISNIF_FIFO_MOSI_REG",
            Register::FifoMiso => "SPISNIF_FIFO_MISO_REG",
            Register::FifoPacket => "SPISNIF_FIFO_PACKET_REG",
            Register::Status => "SPISNIF_STATUS_REG",
            Register::Config => "SPISNIF_CONFIG_REG",
            Register::Id => "SPISNIF_ID_REG",
            Register::Prescaler => "SPISNIF_PRESCALER_REG",
        }
    }

    /// Reading this register pops an element off a device FIFO
    pub fn is_destructive(self) -> bool {
        matches!(self, Register::FifoMosi | Register::FifoMiso | Register::FifoPacket)
    }
}

/// Offset table for one instance of the core.
///
/// Offsets are relative to `base`, which is itself relative to the start of
/// the mapped FPGA window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterMap {
    pub base: usize,
    pub control: u16,
    pub fifo_mosi: u16,
    pub fifo_miso: u16,
    pub fifo_packet: u16,
    pub status: u16,
    pub config: u16,
    pub id: u16,
    pub prescaler: u16,
}

impl RegisterMap {
    pub fn offset(&self, reg: Register) -> u16 {
        match reg {
            Register::Control => self.control,
            Register::FifoMosi => self.fifo_mosi,
            Register::FifoMiso => self.fifo_miso,
            Register::FifoPacket => self.fifo_packet,
            Register::Status => self.status,
            Register::Config => self.config,
            Register::Id => self.id,
            Register::Prescaler => self.prescaler,
        }
    }

    /// Byte address of a register inside the mapped window
    pub fn address(&self, reg: Register) -> usize {
        self.base + self.offset(reg) as usize
    }

    /// Check that every register is 16-bit aligned and fits in a window of `len` bytes
    pub fn validate(&self, len: usize) -> crate::Result<()> {
        for reg in Register::ALL {
            let addr = self.address(reg);
            if addr % 2 != 0 {
                return Err(crate::SharedError::config(format!(
                    "{} at {:#x} is not 16-bit aligned",
                    reg.name(),
                    addr
                )));
            }
            if addr + 2 > len {
                return Err(crate::SharedError::config(format!(
                    "{} at {:#x} lies outside the {:#x} byte window",
                    reg.name(),
                    addr,
                    len
                )));
            }
        }
        Ok(())
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            base: IP_BASE,
            control: CONTROL,
            fifo_mosi: FIFO_MOSI,
            fifo_miso: FIFO_MISO,
            fifo_packet: FIFO_PACKET,
            status: STATUS,
            config: CONFIG,
            id: ID,
            prescaler: PRESCALER,
        }
    }
}
