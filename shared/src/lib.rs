/*!
# Shared Types and Utilities

Capture engine for the spisnif FPGA core: register access, the readiness
protocol, frame assembly from the device FIFOs, bit-order recovery and
rendering.

## Core Types

- [`SpiSnif`] - typed handle over any [`RegisterAccess`] implementation
- [`Frame`] - one captured bus transaction
- [`Readiness`] - classified status register value
- [`BusConfig`] - chip select / clock polarity and phase flags

## Modules

- [`regs`] - register offsets and bit masks
- [`device`] - register access seam, `/dev/mem` window, protocol operations
- [`assembler`] - FIFO drain into frame lists
- [`word`] - bit-order normalization and word geometry
- [`render`] - text and JSON dumps
- [`notify`] - capture-done notification flag
- [`sim`] - software model of the core
- [`error`] - common error types
*/

pub mod assembler;
pub mod device;
pub mod error;
pub mod frame;
pub mod notify;
pub mod readiness;
pub mod regs;
pub mod render;
pub mod sim;
pub mod word;

// Re-export commonly used types
pub use assembler::{assemble, SessionLimits};
pub use device::{MappedWindow, RegisterAccess, SpiSnif};
pub use error::{Result, SharedError};
pub use frame::{Frame, FrameList, Lane};
pub use notify::{ready_flag, Notifier, ReadyWaiter, Wake};
pub use readiness::{BusConfig, Readiness};
pub use regs::{Register, RegisterMap};

/// Version information for the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// Bits per FIFO word
    pub const WORD_BITS: usize = 16;

    /// Largest bit count a single frame can report
    pub const MAX_BIT_COUNT: u16 = 2047;

    /// Default polling interval in milliseconds
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
}
