/*!
Interrupt source for blocking mode.

The core's interrupt line is exposed to userspace through a UIO node. A read
of four bytes blocks until the next interrupt and returns the running count;
writing `1u32` re-enables the line. Each interrupt raises the ready flag.
*/

use anyhow::{Context, Result};
use shared::Notifier;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

pub struct UioInterrupt {
    path: PathBuf,
    file: File,
}

impl UioInterrupt {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .with_context(|| format!("Failed to open interrupt device {}", path.as_ref().display()))?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file,
        })
    }

    fn enable(&mut self) -> std::io::Result<()> {
        self.file.write_all(&1u32.to_ne_bytes())
    }

    /// Block until the next interrupt; returns the kernel's event count
    fn wait(&mut self) -> std::io::Result<u32> {
        let mut count = [0u8; 4];
        self.file.read_exact(&mut count)?;
        Ok(u32::from_ne_bytes(count))
    }

    /// Forward interrupts to `notifier` on a background thread.
    ///
    /// The thread ends when the waiter side is dropped (checked on the next
    /// interrupt) or the device node fails.
    pub fn spawn(mut self, notifier: Notifier) -> JoinHandle<()> {
        thread::spawn(move || {
            info!("🔔 Listening for interrupts on {}", self.path.display());
            loop {
                if let Err(e) = self.enable() {
                    error!("Failed to re-enable interrupt on {}: {}", self.path.display(), e);
                    break;
                }
                match self.wait() {
                    Ok(count) => {
                        debug!("Interrupt #{}", count);
                        if !notifier.signal() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Interrupt wait failed on {}: {}", self.path.display(), e);
                        break;
                    }
                }
            }
            info!("Interrupt listener stopped");
        })
    }
}
