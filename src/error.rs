use std::{io, path::PathBuf};

use nix::errno::Errno;
use thiserror::Error;

use crate::{endpoint::EndpointId, serial::error::DeviceError};

/// Process exit codes, one per fatal class.
pub mod exit_code {
    /// The bridge was asked to stop and did so.
    pub const SHUTDOWN: i32 = 0;

    /// An endpoint went away or the wait primitive failed while relaying.
    pub const RELAY: i32 = 1;

    /// Malformed invocation or configuration.
    /// Matches what clap uses for usage errors.
    pub const USAGE: i32 = 2;

    /// The device could not be opened.
    pub const DEVICE: i32 = 3;

    /// The bus could not be connected to.
    pub const BUS: i32 = 4;

    /// The process could not be set up to run: daemonizing or installing signal handlers failed.
    pub const SETUP: i32 = 5;
}

/// Why an endpoint is considered gone.
#[derive(Debug, Error)]
pub enum Termination {
    /// The peer hung up.
    #[error("hang-up")]
    HangUp,

    /// The descriptor reported an error condition.
    #[error("error condition")]
    ErrorCondition,

    /// The descriptor is not open.
    #[error("invalid descriptor")]
    InvalidDescriptor,

    /// A read returned no bytes where that means the peer closed its end.
    #[error("end of stream")]
    EndOfStream,

    /// A read or write failed.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
}

/// Errors thay may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The invocation or the configuration file is not usable.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// Connecting to the bus broker failed.
    #[error("Cannot connect to bus at {path:?}")]
    BusConnect {
        /// The socket path tried.
        path: PathBuf,

        /// The underlying problem.
        #[source]
        source: io::Error,
    },

    /// Opening the device failed.
    #[error("Cannot open device {path:?}")]
    DeviceOpen {
        /// The device path tried.
        path: PathBuf,

        /// The underlying problem.
        #[source]
        source: DeviceError,
    },

    /// One side of the relay went away.
    #[error("The {endpoint} endpoint terminated: {cause}")]
    PeerTerminated {
        /// Which side.
        endpoint: EndpointId,

        /// What was observed.
        cause: Termination,
    },

    /// The multiplexed wait itself failed.
    #[error("Poll error: {0}")]
    Wait(#[source] Errno),

    /// Detaching from the terminal failed.
    #[error("Cannot daemonize")]
    Daemonize(#[source] Errno),

    /// The termination signal handler could not be installed.
    #[error("Cannot install signal handler")]
    SignalHandler(#[source] ctrlc::Error),
}

impl Error {
    /// The exit status the process should terminate with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::BadConfig(_) => exit_code::USAGE,
            Error::BusConnect { .. } => exit_code::BUS,
            Error::DeviceOpen { .. } => exit_code::DEVICE,
            Error::PeerTerminated { .. } | Error::Wait(_) => exit_code::RELAY,
            Error::Daemonize(_) | Error::SignalHandler(_) => exit_code::SETUP,
        }
    }

    pub(crate) fn terminated(endpoint: &EndpointId, cause: impl Into<Termination>) -> Self {
        Self::PeerTerminated {
            endpoint: endpoint.clone(),
            cause: cause.into(),
        }
    }

    /// Get the message of a [`Error::BadConfig`], if that is what this is.
    pub fn try_into_bad_config(self) -> Option<String> {
        match self {
            Error::BadConfig(message) => Some(message),
            _ => None,
        }
    }
}
