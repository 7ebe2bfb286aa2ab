//! Multicast fan-out of trace records over the datagram socket.
//!
//! The destination is configured once at startup and every record is sent
//! as exactly one datagram holding both payload halves back to back.
//! Delivery is best effort: failures are logged, never returned by
//! [`MulticastState::send`].

use super::address::{AddressFamily, EndpointAddress};
use super::binder;
use super::error::{Result, TransportError};
use super::traits::DatagramSink;
use crate::config::UdpConfig;
use socket2::SockAddr;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Mutex, PoisonError};

const TARGET: &str = "dlt_transport::multicast";

/// Destination address plus validity. Starts out invalid.
#[derive(Debug, Clone, Default)]
pub struct ClientDestination {
    addr: Option<SockAddr>,
}

impl ClientDestination {
    pub fn new() -> Self {
        log::debug!(target: TARGET, "client addr struct init success");
        ClientDestination { addr: None }
    }

    /// Store the destination and mark it valid.
    ///
    /// A valid destination is never overwritten; call [`reset`](Self::reset) first.
    /// For [`AddressFamily::V6`] an IPv4 group is accepted and stored v4-mapped.
    pub fn set(&mut self, family: AddressFamily, ip: &str, port: u16) -> Result<()> {
        if let Some(current) = self.socket_addr() {
            return Err(TransportError::DestinationAlreadySet { current });
        }
        let endpoint = EndpointAddress::resolve_destination(family, ip, port)?;
        self.addr = Some(SockAddr::from(endpoint.socket_addr()));
        log::info!(target: TARGET, "multicast destination set to {}", endpoint);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.addr = None;
    }

    pub fn is_valid(&self) -> bool {
        self.addr.is_some()
    }

    pub fn addr(&self) -> Option<&SockAddr> {
        self.addr.as_ref()
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.addr.as_ref().and_then(SockAddr::as_socket)
    }

    /// Length of the stored address structure, zero while invalid.
    pub fn addr_len(&self) -> usize {
        self.addr.as_ref().map_or(0, |addr| addr.len() as usize)
    }
}

/// Send `first ‖ second` as one datagram to `destination`, logging any failure.
pub fn multicast_send<S: DatagramSink + ?Sized>(
    destination: &ClientDestination,
    sink: &mut S,
    first: &[u8],
    second: &[u8],
) {
    // Failures were logged where they happened.
    let _ = try_multicast_send(destination, sink, first, second);
}

/// Like [`multicast_send`] but also hands the outcome back.
///
/// Every violated precondition is logged before the first one is returned;
/// the socket is not touched unless all of them hold.
pub fn try_multicast_send<S: DatagramSink + ?Sized>(
    destination: &ClientDestination,
    sink: &mut S,
    first: &[u8],
    second: &[u8],
) -> Result<usize> {
    let mut rejected = None;

    if !destination.is_valid() {
        log::error!(target: TARGET, "multicast_send: destination is not valid");
        rejected = Some(TransportError::InvalidDestination);
    }
    if first.is_empty() {
        log::error!(target: TARGET, "multicast_send: first payload is empty");
    }
    if second.is_empty() {
        log::error!(target: TARGET, "multicast_send: second payload is empty");
    }
    if rejected.is_none() && (first.is_empty() || second.is_empty()) {
        rejected = Some(TransportError::InvalidPayload {
            first_len: first.len(),
            second_len: second.len(),
        });
    }

    let addr = match (rejected, destination.addr()) {
        (None, Some(addr)) => addr,
        (Some(err), _) => return Err(err),
        (None, None) => return Err(TransportError::InvalidDestination),
    };

    let mut datagram = Vec::with_capacity(first.len() + second.len());
    datagram.extend_from_slice(first);
    datagram.extend_from_slice(second);

    #[cfg(feature = "packet-dump")]
    log::trace!(target: TARGET, "datagram ({} bytes): {:02x?}", datagram.len(), datagram);

    match sink.send_to(&datagram, addr) {
        Ok(sent) => {
            if sent < datagram.len() {
                log::warn!(
                    target: TARGET,
                    "multicast_send: datagram truncated to {} of {} bytes",
                    sent,
                    datagram.len()
                );
            }
            Ok(sent)
        }
        Err(source) => {
            log::error!(target: TARGET, "multicast_send: send UDP packet data failed: {}", source);
            Err(TransportError::SendFailed { bytes_sent: 0, source })
        }
    }
}

/// Datagram socket and the destination it fans out to.
///
/// Created once at startup and shared by reference. The destination is only
/// written through `&mut self` before the state is shared; the send path
/// is serialized by an internal lock.
pub struct MulticastState<S: DatagramSink = UdpSocket> {
    destination: ClientDestination,
    socket: Mutex<S>,
}

impl MulticastState<UdpSocket> {
    /// Open the datagram socket and set the destination from `config`.
    pub fn setup(family: AddressFamily, config: &UdpConfig) -> Result<Self> {
        let socket = binder::open_datagram(
            family,
            &config.bind_ip,
            config.port,
            config.recv_buffer_size,
        )
        .inspect_err(|_| log::error!(target: TARGET, "could not initialize udp socket"))?;

        let mut state = MulticastState::with_socket(socket);
        state.set_destination(family, &config.multicast.ip, config.multicast.port)?;
        log::debug!(target: TARGET, "initialize udp socket success");
        Ok(state)
    }
}

impl<S: DatagramSink> MulticastState<S> {
    pub fn with_socket(socket: S) -> Self {
        MulticastState {
            destination: ClientDestination::new(),
            socket: Mutex::new(socket),
        }
    }

    pub fn set_destination(&mut self, family: AddressFamily, ip: &str, port: u16) -> Result<()> {
        self.destination.set(family, ip, port)
    }

    pub fn destination(&self) -> &ClientDestination {
        &self.destination
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.lock().local_addr()
    }

    /// Fire-and-forget send of one record.
    pub fn send(&self, first: &[u8], second: &[u8]) {
        multicast_send(&self.destination, &mut *self.lock(), first, second);
    }

    pub fn try_send(&self, first: &[u8], second: &[u8]) -> Result<usize> {
        try_multicast_send(&self.destination, &mut *self.lock(), first, second)
    }

    /// Release the socket. Consuming `self` rules out sends after close.
    pub fn close(self) {
        let socket = self.socket.into_inner().unwrap_or_else(PoisonError::into_inner);
        match socket.local_addr() {
            Ok(addr) => log::info!(target: TARGET, "closing udp connection on {}", addr),
            Err(_) => log::info!(target: TARGET, "closing udp connection"),
        }
        drop(socket);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, S> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    type SentLog = Arc<Mutex<Vec<(Vec<u8>, SocketAddr)>>>;

    struct RecordingSink {
        sent: SentLog,
        fail: bool,
    }

    impl RecordingSink {
        fn new() -> (Self, SentLog) {
            let sent = SentLog::default();
            (RecordingSink { sent: sent.clone(), fail: false }, sent)
        }
    }

    impl DatagramSink for RecordingSink {
        fn send_to(&mut self, data: &[u8], destination: &SockAddr) -> io::Result<usize> {
            let addr = destination.as_socket().expect("inet destination");
            self.sent.lock().unwrap().push((data.to_vec(), addr));
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::AddrNotAvailable, "no route"));
            }
            Ok(data.len())
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:3490".parse().unwrap())
        }
    }

    fn valid_destination() -> ClientDestination {
        let mut dest = ClientDestination::new();
        dest.set(AddressFamily::V4, "225.0.0.37", 3490).unwrap();
        dest
    }

    #[test]
    fn test_destination_starts_invalid() {
        let dest = ClientDestination::new();
        assert!(!dest.is_valid());
        assert_eq!(dest.addr_len(), 0);
        assert!(dest.socket_addr().is_none());
    }

    #[test]
    fn test_destination_set_once() {
        let mut dest = valid_destination();
        assert!(dest.is_valid());
        assert!(dest.addr_len() > 0);
        assert_eq!(dest.socket_addr(), Some("225.0.0.37:3490".parse().unwrap()));

        let err = dest.set(AddressFamily::V4, "225.0.0.38", 3490).unwrap_err();
        assert!(matches!(err, TransportError::DestinationAlreadySet { .. }));

        dest.reset();
        dest.set(AddressFamily::V4, "225.0.0.38", 4000).unwrap();
        assert_eq!(dest.socket_addr(), Some("225.0.0.38:4000".parse().unwrap()));
    }

    #[test]
    fn test_ipv4_group_on_ipv6_socket_is_mapped() {
        let mut dest = ClientDestination::new();
        dest.set(AddressFamily::V6, "225.0.0.37", 3490).unwrap();
        assert!(dest.is_valid());
        assert_eq!(
            dest.socket_addr(),
            Some("[::ffff:225.0.0.37]:3490".parse().unwrap())
        );
    }

    #[test]
    fn test_bad_destination_literal_stays_invalid() {
        let mut dest = ClientDestination::new();
        assert!(dest.set(AddressFamily::V4, "225.0.0", 3490).is_err());
        assert!(!dest.is_valid());
    }

    #[test]
    fn test_invalid_destination_never_touches_socket() {
        let (mut sink, sent) = RecordingSink::new();
        let err =
            try_multicast_send(&ClientDestination::new(), &mut sink, b"AB", b"CD").unwrap_err();
        assert!(matches!(err, TransportError::InvalidDestination));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_halves_never_touch_socket() {
        let dest = valid_destination();
        let (mut sink, sent) = RecordingSink::new();

        multicast_send(&dest, &mut sink, b"", b"CD");
        multicast_send(&dest, &mut sink, b"AB", b"");
        multicast_send(&dest, &mut sink, b"", b"");
        assert!(sent.lock().unwrap().is_empty());

        let err = try_multicast_send(&dest, &mut sink, b"AB", b"").unwrap_err();
        assert!(matches!(
            err,
            TransportError::InvalidPayload { first_len: 2, second_len: 0 }
        ));
    }

    #[test]
    fn test_invalid_destination_wins_over_payload() {
        let (mut sink, _) = RecordingSink::new();
        let err = try_multicast_send(&ClientDestination::new(), &mut sink, b"", b"").unwrap_err();
        assert!(matches!(err, TransportError::InvalidDestination));
    }

    #[test]
    fn test_one_datagram_with_both_halves() {
        let dest = valid_destination();
        let (mut sink, sent) = RecordingSink::new();

        assert_eq!(try_multicast_send(&dest, &mut sink, b"AB", b"CD").unwrap(), 4);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, b"ABCD");
        assert_eq!(sent[0].1, "225.0.0.37:3490".parse().unwrap());
    }

    #[test]
    fn test_transmit_failure_is_swallowed() {
        let dest = valid_destination();
        let (mut sink, sent) = RecordingSink::new();
        sink.fail = true;

        multicast_send(&dest, &mut sink, b"AB", b"CD");
        assert_eq!(sent.lock().unwrap().len(), 1);

        let err = try_multicast_send(&dest, &mut sink, b"AB", b"CD").unwrap_err();
        assert!(matches!(err, TransportError::SendFailed { bytes_sent: 0, .. }));
    }

    #[test]
    fn test_state_rejects_sends_before_destination() {
        let (sink, sent) = RecordingSink::new();
        let mut state = MulticastState::with_socket(sink);

        state.send(b"AB", b"CD");
        assert!(sent.lock().unwrap().is_empty());

        state.set_destination(AddressFamily::V4, "225.0.0.37", 3490).unwrap();
        state.send(b"AB", b"CD");
        assert_eq!(sent.lock().unwrap().len(), 1);
        state.close();
    }

    #[test]
    fn test_state_is_shareable_across_threads() {
        let (sink, sent) = RecordingSink::new();
        let mut state = MulticastState::with_socket(sink);
        state.set_destination(AddressFamily::V4, "225.0.0.37", 3490).unwrap();
        let state = Arc::new(state);

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        state.send(&[i], b"payload");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 100);
        assert!(sent.iter().all(|(data, _)| data.len() == 8 && &data[1..] == b"payload"));
    }

    #[test]
    fn test_loopback_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap();

        let socket = binder::open_datagram(AddressFamily::V4, "127.0.0.1", 0, 4096).unwrap();
        let mut state = MulticastState::with_socket(socket);
        state
            .set_destination(AddressFamily::V4, "127.0.0.1", target.port())
            .unwrap();
        state.try_send(b"AB", b"CD").unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"ABCD");
        state.close();
    }

    #[test]
    fn test_loopback_datagram_v6() {
        let receiver = UdpSocket::bind("[::1]:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap();

        let socket = binder::open_datagram(AddressFamily::V6, "::1", 0, 4096).unwrap();
        assert!(socket.local_addr().unwrap().is_ipv6());
        let mut state = MulticastState::with_socket(socket);
        state
            .set_destination(AddressFamily::V6, "::1", target.port())
            .unwrap();
        state.try_send(b"AB", b"CD").unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"ABCD");
        assert!(from.is_ipv6());
        state.close();
    }

    // Dual-stack delivery relies on IPV6_V6ONLY being off, the Linux default.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_ipv6_socket_reaches_ipv4_destination() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap();

        let socket = binder::open_datagram(AddressFamily::V6, "0.0.0.0", 0, 4096).unwrap();
        let mut state = MulticastState::with_socket(socket);
        state
            .set_destination(AddressFamily::V6, "127.0.0.1", target.port())
            .unwrap();
        state.try_send(b"v4", b"mapped").unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"v4mapped");
        state.close();
    }
}
