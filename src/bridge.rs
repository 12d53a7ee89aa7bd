use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    bus::BusEndpoint,
    config::Config,
    error::Error,
    relay::{self, Relay},
    serial::{
        self,
        gps::{GpsSync, UbxSync},
    },
};

/// Run the bridge with the built-in u-blox GPS support.
///
/// See [`run_with_gps`].
pub fn run(config: &Config, shutdown: &CancellationToken) -> Result<(), Error> {
    run_with_gps(config, &UbxSync, shutdown)
}

/// Connect to the bus, acquire the device, send the init string if any,
/// then relay until `shutdown` is cancelled.
///
/// The bus is connected first, so a missing broker is reported
/// without ever touching the device.
/// Every error returned is fatal for the bridge, and [`Error::exit_code`]
/// tells which kind it was.
pub fn run_with_gps(
    config: &Config,
    gps: &dyn GpsSync,
    shutdown: &CancellationToken,
) -> Result<(), Error> {
    config.validate()?;

    let bus = BusEndpoint::connect(&config.bus_path)?;
    let mut device = serial::acquire(config, gps)?;

    if let Some(init) = &config.init_string {
        relay::inject_init(&mut device, init.as_bytes(), config.timings.write_window())?;
    }

    let mut relay = Relay::new(device, bus, config.timings);
    let result = relay.run(shutdown);

    info!(stats = ?relay.stats(), "Bridge done");

    result
}
