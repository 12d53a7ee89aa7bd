/// Serial device related errors.
pub mod error;

/// The device endpoint and how it is acquired.
pub(crate) mod device;

/// GPS synchronized device opening.
pub mod gps;

pub use device::{acquire, DeviceEndpoint};
