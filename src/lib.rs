#![deny(missing_docs)]

//! This crate attaches a serial device to a tty bus.
//!
//! A bus broker listens on a local socket (by default `/tmp/ttybus`) and
//! shares whatever arrives among every process attached to it.
//! The bridge in this crate is one such process: it connects to the broker,
//! opens the real device (plainly, or through a GPS synchronization layer),
//! optionally sends an init string to the device,
//! and then relays bytes both ways until either side goes away.
//!
//! The relay favours bounded latency over delivery:
//! bytes are dropped when their destination is not ready in time.
//! See [`relay`].

/// Setting up and running the bridge as a whole.
pub mod bridge;

/// The connection to the bus broker.
pub mod bus;

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// An endpoint- i.e. one side of the relay.
pub mod endpoint;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;

/// The duplex relay loop.
pub mod relay;

/// Serial device driver.
pub mod serial;
