use socket2::{SockAddr, SockRef};
use std::io::Result;
use std::net::{SocketAddr, UdpSocket};

/// One-shot datagram transmission to an explicit destination.
/// Object-safe so the multicast path can run against a mock in tests.
pub trait DatagramSink: Send {
    /// Transmit `data` as a single datagram to `destination`.
    fn send_to(&mut self, data: &[u8], destination: &SockAddr) -> Result<usize>;

    /// Get the local socket address.
    fn local_addr(&self) -> Result<SocketAddr>;
}

impl DatagramSink for UdpSocket {
    fn send_to(&mut self, data: &[u8], destination: &SockAddr) -> Result<usize> {
        SockRef::from(&*self).send_to(data, destination)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}
