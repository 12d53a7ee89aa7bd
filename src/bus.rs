use std::{
    io::{self, Read, Write},
    os::{
        fd::{AsFd, BorrowedFd},
        unix::net::UnixStream,
    },
    path::Path,
};

use tracing::info;

use crate::{
    endpoint::{Endpoint, EndpointId},
    error::Error,
};

/// The default path the bus broker listens on.
pub const DEFAULT_BUS_PATH: &str = "/tmp/ttybus";

/// A connection to the bus broker.
#[derive(Debug)]
pub struct BusEndpoint {
    id: EndpointId,
    stream: UnixStream,
}

impl BusEndpoint {
    /// Connect to the broker listening at `path`.
    ///
    /// There is no retry: a broker which is not listening is fatal for the bridge.
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        info!(?path, "Connecting to bus");

        let stream = UnixStream::connect(path).map_err(|source| Error::BusConnect {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::from_stream(path, stream))
    }

    /// Use an already connected stream as the bus.
    pub fn from_stream<P: AsRef<Path>>(path: P, stream: UnixStream) -> Self {
        Self {
            id: EndpointId::Bus(path.as_ref().to_path_buf()),
            stream,
        }
    }
}

impl Endpoint for BusEndpoint {
    fn id(&self) -> &EndpointId {
        &self.id
    }

    /// A broker which shut down its writing half reports no hang-up,
    /// only readability and then no bytes.
    fn empty_read_ends_stream(&self) -> bool {
        true
    }
}

impl AsFd for BusEndpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}

impl Read for BusEndpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for BusEndpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
