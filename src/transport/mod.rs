//! # Delivery Transports
//!
//! Socket binding plus the two senders that push serialized trace records
//! to clients.
//!
//! ## Key Types
//!
//! - [`binder`] - `open_stream` / `open_datagram`: create, tune and bind sockets
//! - [`stream`] - `send_reliable` / `send`: complete delivery over a connected stream
//! - [`ClientDestination`] / [`MulticastState`] - the multicast destination and its socket
//! - [`MulticastDispatcher`] - bounded queue drained by one thread owning the multicast socket
//! - [`TransportError`] - failure taxonomy shared by all of the above

pub mod address;
pub mod binder;
pub mod dispatch;
pub mod error;
pub mod multicast;
pub mod payload;
pub mod stream;
pub mod traits;

pub use address::{AddressFamily, EndpointAddress};
pub use binder::{BoundSocket, SocketKind};
pub use dispatch::{MulticastDispatcher, DEFAULT_QUEUE_DEPTH};
pub use error::TransportError;
pub use multicast::{multicast_send, ClientDestination, MulticastState};
pub use payload::PayloadPair;
pub use stream::SERIAL_HEADER;
pub use traits::DatagramSink;
