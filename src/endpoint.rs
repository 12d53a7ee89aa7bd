use std::{
    fmt::Display,
    io::{Read, Write},
    os::fd::AsFd,
    path::PathBuf,
};

/// Identifies one side of the relay.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum EndpointId {
    /// The physical serial device.
    Device(PathBuf),

    /// The connection to the bus broker.
    Bus(PathBuf),
}

impl Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointId::Device(path) => write!(f, "device {}", path.display()),
            EndpointId::Bus(path) => write!(f, "bus {}", path.display()),
        }
    }
}

/// An endpoint is a bidirectional byte stream the relay can wait on.
///
/// Readiness is observed through the descriptor ([`AsFd`]),
/// bytes move through [`Read`] and [`Write`].
/// How the descriptor was obtained (a plain open, a GPS enable call, a socket connect)
/// is invisible past construction.
pub trait Endpoint: AsFd + Read + Write {
    /// Some identifier of the endpoint.
    fn id(&self) -> &EndpointId;

    /// Whether a read returning no bytes means the peer is gone.
    ///
    /// A terminal in canonical mode returns no bytes for an end-of-file character,
    /// which is ordinary input, so the default is to skip such a read.
    /// Real hang-ups are reported by the wait.
    fn empty_read_ends_stream(&self) -> bool {
        false
    }
}
