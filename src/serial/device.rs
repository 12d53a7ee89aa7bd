use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    os::{
        fd::{AsFd, BorrowedFd, OwnedFd},
        unix::fs::OpenOptionsExt,
    },
    path::Path,
};

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    endpoint::{Endpoint, EndpointId},
    error::Error,
    serial::{
        error::DeviceError,
        gps::{self, GpsSync},
    },
};

/// The physical serial device.
///
/// Whether it was opened plainly or through [`GpsSync`],
/// it is the same kind of endpoint to the relay.
#[derive(Debug)]
pub struct DeviceEndpoint {
    id: EndpointId,
    tty: File,
    gps_synchronized: bool,
}

impl DeviceEndpoint {
    /// Open the device at `path` for reading and writing.
    ///
    /// The line settings are left as they are.
    /// The device never becomes the controlling terminal, so a carrier drop
    /// shows up as a hang-up on the descriptor rather than as `SIGHUP`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!(?path, "Opening device");

        let tty = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(path)
            .map_err(|e| Error::DeviceOpen {
                path: path.to_path_buf(),
                source: DeviceError::Io(e),
            })?;

        Ok(Self::new(path, tty, false))
    }

    /// Open the device at `path` through the GPS synchronization layer.
    pub fn gps_enable<P: AsRef<Path>>(path: P, gps: &dyn GpsSync) -> Result<Self, Error> {
        let path = path.as_ref();

        match gps.enable(path, gps::RECEIVER, 0) {
            Ok(tty) => {
                info!(?path, "TTY port open for GPS synchronization");
                Ok(Self::new(path, tty, true))
            }
            Err(e) => {
                warn!(?path, "Impossible to open device for GPS sync (check permissions)");
                Err(Error::DeviceOpen {
                    path: path.to_path_buf(),
                    source: DeviceError::Gps(e),
                })
            }
        }
    }

    /// Use an already open descriptor as the device.
    pub fn from_fd<P: AsRef<Path>>(path: P, fd: OwnedFd) -> Self {
        Self::new(path.as_ref(), File::from(fd), false)
    }

    fn new(path: &Path, tty: File, gps_synchronized: bool) -> Self {
        Self {
            id: EndpointId::Device(path.to_path_buf()),
            tty,
            gps_synchronized,
        }
    }

    /// Whether the device was opened through the GPS synchronization layer.
    pub fn is_gps_synchronized(&self) -> bool {
        self.gps_synchronized
    }
}

/// Acquire the device named in the config, in the mode the config asks for.
pub fn acquire(config: &Config, gps: &dyn GpsSync) -> Result<DeviceEndpoint, Error> {
    let path = config
        .device
        .as_deref()
        .ok_or_else(|| Error::BadConfig("No device given".into()))?;

    if config.gps {
        DeviceEndpoint::gps_enable(path, gps)
    } else {
        DeviceEndpoint::open(path)
    }
}

impl Endpoint for DeviceEndpoint {
    fn id(&self) -> &EndpointId {
        &self.id
    }
}

impl AsFd for DeviceEndpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.tty.as_fd()
    }
}

impl Read for DeviceEndpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.tty.read(buf)
    }
}

impl Write for DeviceEndpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tty.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tty.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, path::PathBuf};

    use super::*;
    use crate::serial::error::GpsError;

    /// Records the call and hands back some openable file.
    struct FakeGps {
        calls: RefCell<Vec<(PathBuf, String, u32)>>,
        succeed: bool,
    }

    impl GpsSync for FakeGps {
        fn enable(&self, device: &Path, receiver: &str, interval: u32) -> Result<File, GpsError> {
            self.calls
                .borrow_mut()
                .push((device.to_path_buf(), receiver.to_string(), interval));

            if self.succeed {
                tempfile::tempfile().map_err(GpsError::Open)
            } else {
                Err(GpsError::Open(io::ErrorKind::PermissionDenied.into()))
            }
        }
    }

    #[test]
    fn plain_open_missing_device_is_device_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ttyNothing");

        let err = DeviceEndpoint::open(&path).unwrap_err();
        assert!(matches!(err, Error::DeviceOpen { .. }));
    }

    #[test]
    fn plain_open_is_not_gps() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let device = DeviceEndpoint::open(file.path()).unwrap();
        assert!(!device.is_gps_synchronized());
        assert_eq!(device.id(), &EndpointId::Device(file.path().to_path_buf()));
    }

    #[test]
    fn gps_mode_asks_for_receiver_without_housekeeping() {
        let gps = FakeGps {
            calls: RefCell::new(vec![]),
            succeed: true,
        };

        let device = DeviceEndpoint::gps_enable("/dev/ttyGPS", &gps).unwrap();
        assert!(device.is_gps_synchronized());

        let calls = gps.calls.into_inner();
        assert_eq!(
            calls,
            vec![(PathBuf::from("/dev/ttyGPS"), gps::RECEIVER.to_string(), 0)]
        );
    }

    #[test]
    fn gps_failure_is_device_error() {
        let gps = FakeGps {
            calls: RefCell::new(vec![]),
            succeed: false,
        };

        let err = DeviceEndpoint::gps_enable("/dev/ttyGPS", &gps).unwrap_err();
        assert!(matches!(
            err,
            Error::DeviceOpen {
                source: DeviceError::Gps(_),
                ..
            }
        ));
    }

    #[test]
    fn acquire_without_device_is_bad_config() {
        let gps = FakeGps {
            calls: RefCell::new(vec![]),
            succeed: true,
        };

        let err = acquire(&Config::default(), &gps).unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[test]
    fn acquire_uses_gps_when_asked() {
        let gps = FakeGps {
            calls: RefCell::new(vec![]),
            succeed: true,
        };
        let config = Config {
            device: Some("/dev/ttyGPS".into()),
            gps: true,
            ..Default::default()
        };

        let device = acquire(&config, &gps).unwrap();
        assert!(device.is_gps_synchronized());
        assert_eq!(gps.calls.borrow().len(), 1);
    }
}
