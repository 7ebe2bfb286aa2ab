pub mod config;
pub mod daemon;
pub mod logging;
pub mod transport;

pub use config::{ConfigError, DaemonConfig};
pub use daemon::Delivery;
pub use transport::{
    AddressFamily, ClientDestination, MulticastDispatcher, MulticastState, PayloadPair,
    TransportError, SERIAL_HEADER,
};
