#![allow(dead_code)]

use std::{
    io::{self, Read, Write},
    os::{
        fd::{AsFd, AsRawFd, OwnedFd},
        unix::net::UnixStream,
    },
    path::PathBuf,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use color_eyre::{eyre::eyre, Result};
use nix::{
    poll::{poll, PollFd, PollFlags, PollTimeout},
    pty::{openpty, OpenptyResult},
    sys::termios::{self, SetArg},
};
use tokio_util::sync::CancellationToken;
use tty_attach::{
    bus::BusEndpoint,
    config::Timings,
    error::Error,
    relay::{Relay, RelayStats},
    serial::DeviceEndpoint,
};

pub const DEVICE_PATH: &str = "/dev/ttyTest";
pub const BUS_PATH: &str = "/tmp/ttybus-test";

/// Timings short enough to keep tests quick.
pub fn fast_timings() -> Timings {
    Timings {
        poll_interval_ms: 100,
        write_window_ms: 50,
    }
}

/// Both endpoints, backed by socket pairs.
///
/// The `*_peer` streams are the far ends: what the device and the broker would see.
/// The `*_side` streams share the relay's descriptors, for tampering with them.
pub struct Endpoints {
    pub device: DeviceEndpoint,
    pub device_peer: UnixStream,
    pub device_side: UnixStream,
    pub bus: BusEndpoint,
    pub bus_peer: UnixStream,
    pub bus_side: UnixStream,
}

pub fn endpoints() -> Endpoints {
    let (device_side, device_peer) = UnixStream::pair().expect("Socket pair should be available");
    let (bus_side, bus_peer) = UnixStream::pair().expect("Socket pair should be available");

    let device_fd = OwnedFd::from(device_side.try_clone().expect("Clone should work"));
    let bus_stream = bus_side.try_clone().expect("Clone should work");

    Endpoints {
        device: DeviceEndpoint::from_fd(DEVICE_PATH, device_fd),
        device_peer,
        device_side,
        bus: BusEndpoint::from_stream(BUS_PATH, bus_stream),
        bus_peer,
        bus_side,
    }
}

/// A relay running on its own thread.
pub struct RunningRelay {
    shutdown: CancellationToken,
    handle: JoinHandle<(RelayStats, Result<(), Error>)>,
}

impl RunningRelay {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the relay to stop and wait for it.
    pub fn stop(self) -> (RelayStats, Result<(), Error>) {
        self.shutdown.cancel();
        self.wait()
    }

    /// Wait for the relay to end on its own.
    pub fn wait(self) -> (RelayStats, Result<(), Error>) {
        self.handle.join().expect("Relay thread should not panic")
    }
}

pub fn spawn_relay(device: DeviceEndpoint, bus: BusEndpoint, timings: Timings) -> RunningRelay {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();

    let handle = thread::spawn(move || {
        let mut relay = Relay::new(device, bus, timings);
        let result = relay.run(&token);

        (relay.stats(), result)
    });

    RunningRelay { shutdown, handle }
}

/// Write into `stream` until the kernel refuses more.
/// Returns how many bytes went in.
pub fn fill(stream: &UnixStream) -> usize {
    stream
        .set_nonblocking(true)
        .expect("Should be able to set non-blocking");

    let chunk = [b'#'; 4096];
    let mut filled = 0;

    loop {
        match (&*stream).write(&chunk) {
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => panic!("Unexpected error filling socket: {e}"),
        }
    }

    stream
        .set_nonblocking(false)
        .expect("Should be able to set blocking");

    filled
}

/// Read exactly `n` bytes, or fail if they do not show up in time.
pub fn read_exactly<R: AsFd + Read>(
    reader: &mut R,
    n: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut received = vec![0; n];
    let mut at = 0;

    while at < n {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let millis = u16::try_from(remaining.as_millis()).unwrap_or(u16::MAX);

        let ready = {
            let mut fds = [PollFd::new(reader.as_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::from(millis))?
        };

        if ready == 0 {
            return Err(eyre!(
                "Timed out after {at} of {n} bytes: {:?}",
                String::from_utf8_lossy(&received[..at])
            ));
        }

        match reader.read(&mut received[at..])? {
            0 => return Err(eyre!("Stream closed after {at} of {n} bytes")),
            read => at += read,
        }
    }

    Ok(received)
}

/// Assert nothing is readable within `wait`.
pub fn assert_silent<R: AsFd>(reader: &R, wait: Duration) -> Result<()> {
    let millis = u16::try_from(wait.as_millis()).unwrap_or(u16::MAX);
    let mut fds = [PollFd::new(reader.as_fd(), PollFlags::POLLIN)];

    match poll(&mut fds, PollTimeout::from(millis))? {
        0 => Ok(()),
        _ => Err(eyre!("Expected no data")),
    }
}

/// A pseudo terminal standing in for a serial device.
pub struct Pty {
    pub master: std::fs::File,
    pub slave: OwnedFd,
    pub slave_path: PathBuf,
}

/// Open a pseudo terminal with its default line settings,
/// which are canonical: input is delivered by line and `^D` reads as no bytes.
pub fn canonical_pty() -> Result<Pty> {
    let OpenptyResult { master, slave } = openpty(None, None)?;

    let slave_path = std::fs::read_link(format!("/proc/self/fd/{}", slave.as_raw_fd()))?;

    Ok(Pty {
        master: std::fs::File::from(master),
        slave,
        slave_path,
    })
}

/// Open a pseudo terminal with its line already raw,
/// so bytes pass through unchanged.
pub fn raw_pty() -> Result<Pty> {
    let pty = canonical_pty()?;

    let mut settings = termios::tcgetattr(&pty.slave)?;
    termios::cfmakeraw(&mut settings);
    termios::tcsetattr(&pty.slave, SetArg::TCSANOW, &settings)?;

    Ok(pty)
}
