use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Why the device could not be acquired.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// IO related errors.
    #[error("Underlying IO problem")]
    Io(#[from] io::Error),

    /// The GPS enable call failed.
    #[error("GPS synchronization could not be enabled")]
    Gps(#[from] GpsError),
}

/// Errors from enabling GPS synchronization on a device.
#[derive(Debug, Error)]
pub enum GpsError {
    /// Opening the tty failed.
    #[error("Could not open the GPS tty")]
    Open(#[source] io::Error),

    /// Reading or applying line settings failed.
    #[error("Could not configure the GPS tty")]
    Configure(#[source] Errno),

    /// Writing the receiver configuration command failed.
    #[error("Could not send configuration to the GPS receiver")]
    Command(#[source] io::Error),

    /// Only a zero housekeeping interval is supported.
    #[error("Unsupported housekeeping interval: {0}")]
    UnsupportedInterval(u32),
}
