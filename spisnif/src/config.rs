/*!
Configuration management for the spisnif application.
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::protocol::DEFAULT_POLL_INTERVAL_MS;
use shared::{RegisterAccess, RegisterMap, SessionLimits, SpiSnif};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub acquisition: AcquisitionConfig,
    pub tuning: TuningConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// Load the file if present, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            info!("No config at {}, using defaults", path.as_ref().display());
            Ok(Self::new())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

/// Boards the core ships on, with their FPGA window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// i.MX27
    #[default]
    Apf27,
    /// i.MX51
    Apf51,
    /// MC9328
    Apf9328,
}

impl Platform {
    pub fn fpga_address(self) -> u64 {
        match self {
            Platform::Apf27 => 0xD600_0000,
            Platform::Apf51 => 0xB800_0000,
            Platform::Apf9328 => 0x1200_0000,
        }
    }

    pub fn map_size(self) -> usize {
        match self {
            Platform::Apf27 => 0x2000,
            Platform::Apf51 => 0x10000,
            Platform::Apf9328 => 0x2000,
        }
    }
}

/// Where the core lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Physical memory device node
    pub mem_path: String,

    pub platform: Platform,

    /// Overrides the platform FPGA address
    pub base_address: Option<u64>,

    /// Overrides the platform window size
    pub map_size: Option<usize>,

    /// Register offsets inside the window
    pub registers: RegisterMap,
}

impl DeviceConfig {
    pub fn phys_addr(&self) -> u64 {
        self.base_address.unwrap_or_else(|| self.platform.fpga_address())
    }

    pub fn window_len(&self) -> usize {
        self.map_size.unwrap_or_else(|| self.platform.map_size())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mem_path: "/dev/mem".to_string(),
            platform: Platform::default(),
            base_address: None,
            map_size: None,
            registers: RegisterMap::default(),
        }
    }
}

/// How the acquisition loop learns that captures are pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriveMode {
    /// Read the status register on a fixed interval
    #[default]
    Polling,
    /// Trigger the core and sleep until its interrupt fires
    Blocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub mode: DriveMode,

    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// UIO node delivering the core interrupt (blocking mode)
    pub irq_device: Option<String>,

    /// How long one blocking wait lasts before cancellation is rechecked
    pub wait_slice_ms: u64,

    /// Words held by one session across both lanes before it is dropped
    pub max_session_words: usize,

    pub output: OutputFormat,

    /// Print raw hex words next to the bit strings
    pub show_hex: bool,
}

impl AcquisitionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_slice(&self) -> Duration {
        Duration::from_millis(self.wait_slice_ms)
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_words: self.max_session_words,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            mode: DriveMode::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            irq_device: None,
            wait_slice_ms: 200,
            max_session_words: SessionLimits::default().max_words,
            output: OutputFormat::default(),
            show_hex: false,
        }
    }
}

/// Optional capture settings applied when a session starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub prescaler: Option<u16>,
    /// 0..=7
    pub oversampling: Option<u8>,
    /// External trigger input, 0..=19
    pub ext_trigger: Option<u8>,
    pub ext_trigger_inverted: Option<bool>,
}

impl TuningConfig {
    pub fn apply<A: RegisterAccess>(&self, dev: &mut SpiSnif<A>) -> shared::Result<()> {
        if let Some(prescaler) = self.prescaler {
            dev.set_prescaler(prescaler);
            info!("Prescaler set to {}", prescaler);
        }
        if let Some(os) = self.oversampling {
            dev.set_oversampling(os)?;
            info!("Oversampling set to {}", os);
        }
        if let Some(input) = self.ext_trigger {
            dev.set_ext_trigger(input)?;
            info!("External trigger input set to {}", input);
        }
        if let Some(inverted) = self.ext_trigger_inverted {
            dev.set_ext_trigger_inverted(inverted);
            info!("External trigger inverted: {}", inverted);
        }
        Ok(())
    }
}
