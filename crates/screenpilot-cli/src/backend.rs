//! Input backends the daemon and script runner can drive.

use anyhow::Result;
use clap::ValueEnum;
use screenpilot_core::port::RecordingPort;
use tracing::info;

use crate::engine::BoxedPort;

#[cfg(feature = "native")]
mod native;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Inject real input through the OS (requires the `native` feature)
    Native,
    /// Record events in memory and log them; nothing reaches the OS
    Record,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "native") {
            Backend::Native
        } else {
            Backend::Record
        }
    }
}

/// Open the input port for a backend.
pub fn open(backend: Backend) -> Result<BoxedPort> {
    info!("Using {:?} input backend", backend);
    match backend {
        Backend::Record => Ok(Box::new(RecordingPort::new())),
        Backend::Native => open_native(),
    }
}

#[cfg(feature = "native")]
fn open_native() -> Result<BoxedPort> {
    Ok(Box::new(native::EnigoPort::new()?))
}

#[cfg(not(feature = "native"))]
fn open_native() -> Result<BoxedPort> {
    anyhow::bail!(
        "screenpilot was built without the `native` feature; rebuild with --features native or use --backend record"
    )
}
