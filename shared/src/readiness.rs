/*!
Status classification and bus configuration flags.
*/

use crate::regs::{config, status};
use serde::{Deserialize, Serialize};

/// What the status register says about pending captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Idle sentinel, nothing captured
    NoneReady,
    /// `n` completed frames waiting in the FIFOs
    Ready(u16),
    /// Anything else; the core needs a reset
    DeviceError(u16),
}

impl Readiness {
    pub fn from_status(raw: u16) -> Self {
        if raw == status::NONE_READY {
            Readiness::NoneReady
        } else if raw < status::COUNT_LIMIT {
            Readiness::Ready(raw)
        } else {
            Readiness::DeviceError(raw)
        }
    }

    /// Frames to drain. `Ready(0)` drains nothing, same as `NoneReady`.
    pub fn pending(self) -> Option<u16> {
        match self {
            Readiness::Ready(n) if n > 0 => Some(n),
            _ => None,
        }
    }
}

/// Bus sampling configuration written to the config register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Chip select active high
    pub cs_polarity: bool,
    pub clock_phase: bool,
    pub clock_polarity: bool,
}

impl BusConfig {
    pub fn new(cs_polarity: bool, clock_phase: bool, clock_polarity: bool) -> Self {
        Self {
            cs_polarity,
            clock_phase,
            clock_polarity,
        }
    }

    pub fn bits(&self) -> u16 {
        let mut value = 0;
        if self.cs_polarity {
            value |= config::CSPOL;
        }
        if self.clock_phase {
            value |= config::CPHA;
        }
        if self.clock_polarity {
            value |= config::CPOL;
        }
        value
    }

    pub fn from_bits(bits: u16) -> Self {
        Self {
            cs_polarity: bits & config::CSPOL != 0,
            clock_phase: bits & config::CPHA != 0,
            clock_polarity: bits & config::CPOL != 0,
        }
    }
}
