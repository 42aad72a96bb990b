/*!
# spisnif

Serial bus sniffer front end for the spisnif FPGA core. Maps the core's
registers, waits for captured frames and prints them bit by bit in the order
they went over the wire.

## Usage

### Read frames continuously
```bash
spisnif
```

### Reset the core with a bus configuration
```bash
spisnif cspol -cpha cpol
```

### Interrupt-driven capture with hex words, single cycle
```bash
spisnif --mode blocking --hex --once
```

### Try it without hardware
```bash
spisnif --simulate --interval-ms 200
```
*/

use anyhow::{Context, Result};
use clap::Parser;
use shared::sim::SimulatedDevice;
use shared::{ready_flag, MappedWindow, Notifier, ReadyWaiter, RegisterAccess, RegisterMap, SpiSnif};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod capture;
mod cli;
mod config;
mod irq;

use capture::{Acquisition, CancelToken, Drive};
use cli::{Action, USAGE};
use config::{AppConfig, DriveMode, OutputFormat};
use irq::UioInterrupt;

#[derive(Parser)]
#[command(name = "spisnif")]
#[command(about = "Capture and dump serial bus frames from the spisnif FPGA core")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, default_value = "spisnif.toml")]
    config: PathBuf,

    /// Wait strategy (overrides the config file)
    #[arg(long, value_enum)]
    mode: Option<DriveMode>,

    /// Polling interval in milliseconds (overrides the config file)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Show raw hex words next to the bit strings
    #[arg(long)]
    hex: bool,

    /// Emit one JSON object per cycle instead of text
    #[arg(long)]
    json: bool,

    /// Run a single acquisition cycle and exit
    #[arg(long)]
    once: bool,

    /// Use a simulated core instead of the memory-mapped one
    #[arg(long)]
    simulate: bool,

    /// Print the non-FIFO registers and exit (after any reconfiguration)
    #[arg(long)]
    dump_registers: bool,

    /// Acknowledge the FIFOs, reset the core and exit
    #[arg(long)]
    ack_fifo: bool,

    /// Write a default configuration file and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,

    /// Bus flags: `(-)cspol (-)cpha (-)cpol`, or nothing to capture
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    flags: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the frame dump only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(output) = cli.generate_config {
        return generate_config_file(output);
    }

    let action = Action::from_positionals(&cli.flags);
    if action == Action::Usage {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config)?;
    if let Some(mode) = cli.mode {
        config.acquisition.mode = mode;
    }
    if let Some(interval) = cli.interval_ms {
        config.acquisition.poll_interval_ms = interval;
    }
    if cli.hex {
        config.acquisition.show_hex = true;
    }
    if cli.json {
        config.acquisition.output = OutputFormat::Json;
    }

    let ready = (action == Action::Capture && config.acquisition.mode == DriveMode::Blocking).then(ready_flag);

    let device: Box<dyn RegisterAccess> = if cli.simulate {
        info!("🧪 Using simulated spisnif core");
        let mut sim = SimulatedDevice::synthetic();
        if let Some((notifier, _)) = &ready {
            // the model raises the flag itself when triggered
            sim.attach_notifier(notifier.clone());
        }
        Box::new(sim)
    } else {
        Box::new(open_window(&config)?)
    };
    let mut dev = SpiSnif::new(device);

    let mut stdout = std::io::stdout();
    let configured = setup(&mut dev, &action, cli.ack_fifo, &mut stdout)?;
    if cli.dump_registers {
        print_map(&mut dev, &config.device.registers, &mut stdout)?;
    }
    if configured || cli.dump_registers {
        return Ok(());
    }

    run_capture(dev, config, ready, cli.simulate, cli.once)
}

/// Apply one-shot register changes. Returns true if anything was written,
/// in which case no capture follows.
fn setup<A: RegisterAccess, W: Write>(
    dev: &mut SpiSnif<A>,
    action: &Action,
    ack_fifo: bool,
    out: &mut W,
) -> Result<bool> {
    let mut configured = false;
    if let Action::Reconfigure(bus) = action {
        writeln!(out, "reseting ...")?;
        dev.configure(*bus);
        writeln!(out, "write config {:04X}", bus.bits())?;
        configured = true;
    }
    if ack_fifo {
        dev.ack_fifo();
        dev.reset();
        info!("FIFOs acknowledged");
        configured = true;
    }
    Ok(configured)
}

fn open_window(config: &AppConfig) -> Result<MappedWindow> {
    let device = &config.device;
    MappedWindow::open(
        &device.mem_path,
        device.phys_addr(),
        device.window_len(),
        device.registers.clone(),
    )
    .with_context(|| format!("Failed to map {:#010x} from {}", device.phys_addr(), device.mem_path))
}

fn run_capture(
    mut dev: SpiSnif<Box<dyn RegisterAccess>>,
    config: AppConfig,
    ready: Option<(Notifier, ReadyWaiter)>,
    simulate: bool,
    once: bool,
) -> Result<()> {
    info!("🚀 spisnif {} on core ID {:04X}", shared::VERSION, dev.id());
    config.tuning.apply(&mut dev).context("Invalid tuning settings")?;

    let acq_config = &config.acquisition;
    let drive = match acq_config.mode {
        DriveMode::Polling => Drive::Polling {
            interval: acq_config.poll_interval(),
        },
        DriveMode::Blocking => {
            let (notifier, waiter) = ready.context("Blocking mode without a ready flag")?;
            if !simulate {
                let path = acq_config
                    .irq_device
                    .as_ref()
                    .context("Blocking mode needs acquisition.irq_device in the config")?;
                // detached; ends once the waiter is dropped and the next interrupt arrives
                UioInterrupt::open(path)?.spawn(notifier);
            }
            Drive::Blocking {
                waiter,
                slice: acq_config.wait_slice().max(Duration::from_millis(1)),
            }
        }
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, stopping after the current cycle...");
        handler_token.cancel();
    })?;

    let mut acquisition = Acquisition::new(dev, drive, std::io::stdout())
        .with_format(acq_config.output, acq_config.show_hex)
        .with_limits(acq_config.limits());

    acquisition.run(&cancel, once)?;
    debug!("Acquisition loop left in {:?} state", acquisition.state());
    let stats = acquisition.stats();
    if stats.device_errors > 0 {
        warn!("Core reported {} error status(es) during the session", stats.device_errors);
    }

    info!("✅ Capture completed");
    Ok(())
}

/// Print every register whose read has no side effect
fn print_map<A: RegisterAccess, W: Write>(dev: &mut SpiSnif<A>, regs: &RegisterMap, out: &mut W) -> Result<()> {
    for (reg, value) in dev.dump() {
        writeln!(out, "{:<24}({:02X}) -> {:04X}", reg.name(), regs.address(reg), value)?;
    }
    Ok(())
}

/// Generate a default configuration file
fn generate_config_file(output_path: PathBuf) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(&output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   spisnif --config {}", output_path.display());

    Ok(())
}
