use std::{path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{bus::DEFAULT_BUS_PATH, error::Error};

/// The bounded waits of the relay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// How long to wait for either side to become readable before
    /// going around the loop again.
    pub poll_interval_ms: u64,

    /// How long to wait for a destination to become writable
    /// before its pending bytes are dropped.
    /// Also bounds the wait before sending the init string.
    pub write_window_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            write_window_ms: 50,
        }
    }
}

impl Timings {
    /// See [`Timings::poll_interval_ms`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// See [`Timings::write_window_ms`].
    pub fn write_window(&self) -> Duration {
        Duration::from_millis(self.write_window_ms)
    }
}

/// The configuration used for running the bridge.
///
/// Built once before anything is opened and never changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Where the bus broker listens.
    pub bus_path: PathBuf,

    /// The serial device to attach.
    /// Likely "/dev/ttyS0" or "/dev/ttyACMx".
    pub device: Option<PathBuf>,

    /// Open the device through the GPS synchronization layer.
    pub gps: bool,

    /// Detach from the terminal and run as a daemon.
    pub daemonize: bool,

    /// Sent to the device (followed by a newline) once, before relaying starts.
    pub init_string: Option<String>,

    /// See [`Timings`].
    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_path: DEFAULT_BUS_PATH.into(),
            device: None,
            gps: false,
            daemonize: false,
            init_string: None,
            timings: Timings::default(),
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Could not parse configuration: {e}")))
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            bus_path: "/tmp/ttyS0mux".into(),
            device: Some("/dev/ttyS0".into()),
            init_string: Some("AT".into()),
            ..Default::default()
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap_or_else(|e| format!("/* could not serialize configuration: {e} */"))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let p = p.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::BadConfig(format!("Could not read {p:?}: {e}")))?;

        Self::deserialize(&s)
    }

    fn check_device(&self) -> Result<(), Error> {
        match &self.device {
            Some(device) if !device.as_os_str().is_empty() => Ok(()),
            _ => Err(Error::BadConfig("A tty device must be given".into())),
        }
    }

    fn check_bus_path(&self) -> Result<(), Error> {
        if self.bus_path.as_os_str().is_empty() {
            Err(Error::BadConfig("The bus path must not be empty".into()))
        } else {
            Ok(())
        }
    }

    fn check_timings(&self) -> Result<(), Error> {
        let range = 1..=u64::from(u16::MAX);

        for (name, value) in [
            ("poll_interval_ms", self.timings.poll_interval_ms),
            ("write_window_ms", self.timings.write_window_ms),
        ] {
            if !range.contains(&value) {
                return Err(Error::BadConfig(format!(
                    "`{name}` is {value}, it must be within {range:?}"
                )));
            }
        }

        Ok(())
    }

    /// Check the configuration is usable for running the bridge.
    pub fn validate(&self) -> Result<(), Error> {
        self.check_device()?;
        self.check_bus_path()?;
        self.check_timings()?;

        Ok(())
    }
}
