//! The duplex relay between the device and the bus.
//!
//! The relay is a single loop over `poll(2)`:
//! wait for either side to become readable, read one quantum,
//! wait briefly for the other side to become writable, and write the quantum.
//!
//! A quantum whose destination does not become writable within the write window
//! is dropped. Nothing is queued and nothing is retried, so a slow or stalled
//! consumer loses data instead of growing memory or delaying the other direction.
//! Protocols riding on the bus which cannot tolerate lost bytes must recover on their own.
//!
//! Any hang-up, error or invalid descriptor on either side ends the relay with an error.
//! A read of no bytes from the device is skipped, while on the bus it means the broker
//! closed its end (see [`Endpoint::empty_read_ends_stream`]).

use std::{
    io::{self, Read, Write},
    os::fd::AsFd,
    time::Duration,
};

use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags, PollTimeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    config::Timings,
    endpoint::{Endpoint, EndpointId},
    error::{Error, Termination},
};

/// The upper bound of bytes moved in one direction per loop iteration.
pub const BUFFER_SIZE: usize = 4096;

/// `poll(2)` takes milliseconds; longer waits saturate.
fn timeout_millis(duration: Duration) -> u16 {
    u16::try_from(duration.as_millis()).unwrap_or(u16::MAX)
}

/// Wait up to `window` for `endpoint` to accept writes.
///
/// Returns whether it became writable in time.
/// Only a failure of the wait itself is an error.
pub fn wait_writable<E: AsFd>(endpoint: &E, window: Duration) -> Result<bool, Error> {
    let mut fds = [PollFd::new(endpoint.as_fd(), PollFlags::POLLOUT)];

    match poll(&mut fds, PollTimeout::from(timeout_millis(window))) {
        Ok(0) | Err(Errno::EINTR) => Ok(false),
        Ok(_) => Ok(fds[0]
            .revents()
            .is_some_and(|events| events.contains(PollFlags::POLLOUT))),
        Err(e) => Err(Error::Wait(e)),
    }
}

/// Send `init` plus a newline to the device, if it is writable within `window`.
///
/// This is a single attempt.
/// Returns `Ok(false)` if the device was busy and nothing was sent.
pub fn inject_init<E: Endpoint>(
    device: &mut E,
    init: &[u8],
    window: Duration,
) -> Result<bool, Error> {
    if !wait_writable(&*device, window)? {
        warn!(device = %device.id(), "Device is busy, cannot send init string");
        return Ok(false);
    }

    let mut line = Vec::with_capacity(init.len() + 1);
    line.extend_from_slice(init);
    line.push(b'\n');

    device
        .write_all(&line)
        .map_err(|e| Error::terminated(device.id(), e))?;

    debug!(device = %device.id(), bytes = line.len(), "Sent init string");

    Ok(true)
}

/// Counters for one direction of the relay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirectionStats {
    /// Quanta written to the destination.
    pub forwarded: u64,

    /// Quanta dropped because the destination was not writable in time.
    pub dropped: u64,

    /// Bytes written to the destination.
    pub bytes: u64,
}

/// Counters for both directions of the relay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Device to bus.
    pub device_to_bus: DirectionStats,

    /// Bus to device.
    pub bus_to_device: DirectionStats,
}

fn check_terminated(id: &EndpointId, events: PollFlags) -> Result<(), Error> {
    let cause = if events.contains(PollFlags::POLLNVAL) {
        Termination::InvalidDescriptor
    } else if events.contains(PollFlags::POLLERR) {
        Termination::ErrorCondition
    } else if events.contains(PollFlags::POLLHUP) {
        Termination::HangUp
    } else {
        return Ok(());
    };

    Err(Error::terminated(id, cause))
}

/// Move one quantum from `source` to `destination`.
fn transfer<S: Endpoint, D: Endpoint>(
    source: &mut S,
    destination: &mut D,
    buffer: &mut [u8],
    window: Duration,
    stats: &mut DirectionStats,
) -> Result<(), Error> {
    let read = match source.read(buffer) {
        Ok(0) if source.empty_read_ends_stream() => {
            return Err(Error::terminated(source.id(), Termination::EndOfStream))
        }
        // Nothing to forward.
        Ok(0) => return Ok(()),
        Ok(read) => read,
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
            return Ok(())
        }
        Err(e) => return Err(Error::terminated(source.id(), e)),
    };

    if wait_writable(&*destination, window)? {
        destination
            .write_all(&buffer[..read])
            .map_err(|e| Error::terminated(destination.id(), e))?;

        stats.forwarded += 1;
        stats.bytes += read as u64;
    } else {
        stats.dropped += 1;
    }

    Ok(())
}

/// The relay between a device and a bus.
pub struct Relay<D, B> {
    device: D,
    bus: B,
    timings: Timings,
    buffer: Box<[u8; BUFFER_SIZE]>,
    stats: RelayStats,
}

impl<D: Endpoint, B: Endpoint> Relay<D, B> {
    /// Create a relay which owns both endpoints.
    pub fn new(device: D, bus: B, timings: Timings) -> Self {
        Self {
            device,
            bus,
            timings,
            buffer: Box::new([0; BUFFER_SIZE]),
            stats: RelayStats::default(),
        }
    }

    /// What the relay has moved (and dropped) so far.
    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Relay until `shutdown` is cancelled or an endpoint goes away.
    ///
    /// Cancellation is checked once per iteration,
    /// so it takes effect within one poll interval.
    /// An error is always fatal: there is no reconnection.
    pub fn run(&mut self, shutdown: &CancellationToken) -> Result<(), Error> {
        info!(device = %self.device.id(), bus = %self.bus.id(), "Relaying");

        while !shutdown.is_cancelled() {
            self.step()?;
        }

        debug!("Shutdown requested, relay stopped");

        Ok(())
    }

    /// Wait for readability on both sides.
    /// `None` means nothing happened within the poll interval.
    fn wait_readable(&self) -> Result<Option<(PollFlags, PollFlags)>, Error> {
        let mut fds = [
            PollFd::new(self.device.as_fd(), PollFlags::POLLIN),
            PollFd::new(self.bus.as_fd(), PollFlags::POLLIN),
        ];

        match poll(
            &mut fds,
            PollTimeout::from(timeout_millis(self.timings.poll_interval())),
        ) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let device = fds[0].revents().unwrap_or(PollFlags::empty());
                let bus = fds[1].revents().unwrap_or(PollFlags::empty());

                Ok(Some((device, bus)))
            }
            // A signal arrived, let the caller look at the shutdown token.
            Err(Errno::EINTR) => Ok(None),
            Err(e) => Err(Error::Wait(e)),
        }
    }

    /// One iteration of the loop.
    fn step(&mut self) -> Result<(), Error> {
        let Some((device_events, bus_events)) = self.wait_readable()? else {
            trace!("Idle");
            return Ok(());
        };

        check_terminated(self.device.id(), device_events)?;
        check_terminated(self.bus.id(), bus_events)?;

        let Self {
            device,
            bus,
            timings,
            buffer,
            stats,
        } = self;
        let window = timings.write_window();

        if device_events.contains(PollFlags::POLLIN) {
            transfer(
                device,
                bus,
                buffer.as_mut_slice(),
                window,
                &mut stats.device_to_bus,
            )?;
        }

        if bus_events.contains(PollFlags::POLLIN) {
            transfer(
                bus,
                device,
                buffer.as_mut_slice(),
                window,
                &mut stats.bus_to_device,
            )?;
        }

        Ok(())
    }
}
