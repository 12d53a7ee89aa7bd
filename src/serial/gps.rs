//! Opening a device through the GPS synchronization layer.
//!
//! The relay does not care how a device handle came to be.
//! In GPS mode the handle is produced by a [`GpsSync`] implementation,
//! which is free to configure the receiver before handing the handle over.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    os::unix::fs::OpenOptionsExt,
    path::Path,
};

use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, SetArg, SpecialCharacterIndices,
};
use tracing::{debug, warn};

use crate::serial::error::GpsError;

/// The receiver family the bridge asks for.
pub const RECEIVER: &str = "ubx7";

/// Something able to turn a device path into a time synchronized device handle.
pub trait GpsSync {
    /// Enable GPS synchronization on the device at `device`.
    ///
    /// `receiver` names the receiver family.
    /// An `interval` of zero means the call does no periodic housekeeping.
    fn enable(&self, device: &Path, receiver: &str, interval: u32) -> Result<File, GpsError>;
}

const UBX_SYNC: [u8; 2] = [0xB5, 0x62];

const UBX_CFG_MSG: (u8, u8) = (0x06, 0x01);

const UBX_NAV_TIMEGPS: (u8, u8) = (0x01, 0x20);

/// Message rate per receiver port: I2C, UART1, UART2, USB, SPI, reserved.
const TIMEGPS_ON_UART1: [u8; 6] = [0, 1, 0, 0, 0, 0];

/// u-blox receivers on a tty.
///
/// Sets the line to raw 9600 8N1 and asks the receiver to emit `NAV-TIMEGPS`
/// on its UART so the time reference is available to whoever reads the tty.
#[derive(Debug, Default, Clone, Copy)]
pub struct UbxSync;

impl UbxSync {
    fn configure_line(tty: &File) -> Result<(), GpsError> {
        let mut settings = termios::tcgetattr(tty).map_err(GpsError::Configure)?;

        termios::cfmakeraw(&mut settings);
        termios::cfsetspeed(&mut settings, BaudRate::B9600).map_err(GpsError::Configure)?;

        settings.control_flags &= !(ControlFlags::PARENB | ControlFlags::CSTOPB);
        settings.control_flags |= ControlFlags::CS8 | ControlFlags::CLOCAL | ControlFlags::CREAD;
        settings.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        settings.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

        termios::tcsetattr(tty, SetArg::TCSANOW, &settings).map_err(GpsError::Configure)?;
        termios::tcflush(tty, FlushArg::TCIOFLUSH).map_err(GpsError::Configure)?;

        Ok(())
    }
}

impl GpsSync for UbxSync {
    fn enable(&self, device: &Path, receiver: &str, interval: u32) -> Result<File, GpsError> {
        if interval != 0 {
            return Err(GpsError::UnsupportedInterval(interval));
        }

        if receiver != RECEIVER {
            warn!(%receiver, "This receiver family may not be supported");
        }

        let mut tty = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(device)
            .map_err(GpsError::Open)?;

        Self::configure_line(&tty)?;

        let mut payload = vec![UBX_NAV_TIMEGPS.0, UBX_NAV_TIMEGPS.1];
        payload.extend_from_slice(&TIMEGPS_ON_UART1);
        let command = ubx_frame(UBX_CFG_MSG.0, UBX_CFG_MSG.1, &payload);

        tty.write_all(&command).map_err(GpsError::Command)?;
        debug!(?device, "Asked receiver for NAV-TIMEGPS");

        Ok(tty)
    }
}

/// Build a UBX frame: sync chars, class, id, little endian length, payload, checksum.
pub(crate) fn ubx_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let length = (payload.len() as u16).to_le_bytes();

    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.extend_from_slice(&UBX_SYNC);
    frame.extend_from_slice(&[class, id, length[0], length[1]]);
    frame.extend_from_slice(payload);

    let checksum = ubx_checksum(&frame[UBX_SYNC.len()..]);
    frame.extend_from_slice(&checksum);

    frame
}

/// 8-bit Fletcher checksum as used by UBX.
fn ubx_checksum(bytes: &[u8]) -> [u8; 2] {
    let (a, b) = bytes.iter().fold((0u8, 0u8), |(a, b), byte| {
        let a = a.wrapping_add(*byte);
        (a, b.wrapping_add(a))
    });

    [a, b]
}
