//! Socket creation and binding for both transports.
//!
//! Only failures that leave the socket unusable abort an open: creation,
//! address conversion, bind and listen. Tuning options (`SO_REUSEADDR`,
//! `SO_RCVBUF`) are best effort and only logged.

use super::address::{AddressFamily, EndpointAddress};
use super::error::{Result, TransportError};
use socket2::{Protocol, Socket, Type};
use std::net::{TcpListener, UdpSocket};

const TARGET: &str = "dlt_transport::binder";

/// Pending connection backlog for the stream listener.
pub const LISTEN_BACKLOG: i32 = 3;

/// Receive buffer requested for the datagram socket unless configured otherwise.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 10024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Stream,
    Datagram { recv_buffer_size: usize },
}

/// A socket returned by [`open`], already bound (and listening for streams).
#[derive(Debug)]
pub enum BoundSocket {
    Stream(TcpListener),
    Datagram(UdpSocket),
}

impl BoundSocket {
    pub fn into_listener(self) -> Option<TcpListener> {
        match self {
            BoundSocket::Stream(listener) => Some(listener),
            BoundSocket::Datagram(_) => None,
        }
    }

    pub fn into_datagram(self) -> Option<UdpSocket> {
        match self {
            BoundSocket::Datagram(socket) => Some(socket),
            BoundSocket::Stream(_) => None,
        }
    }
}

/// Create, tune and bind a socket of `kind` on `(ip, port)`.
pub fn open(family: AddressFamily, kind: SocketKind, ip: &str, port: u16) -> Result<BoundSocket> {
    match kind {
        SocketKind::Stream => open_stream(family, ip, port).map(BoundSocket::Stream),
        SocketKind::Datagram { recv_buffer_size } => {
            open_datagram(family, ip, port, recv_buffer_size).map(BoundSocket::Datagram)
        }
    }
}

/// Open the listening socket of the reliable stream transport.
pub fn open_stream(family: AddressFamily, ip: &str, port: u16) -> Result<TcpListener> {
    let endpoint = EndpointAddress::resolve(family, ip, port)?;
    let socket = create(family, Type::STREAM, Protocol::TCP)?;
    log::info!(target: TARGET, "open_stream: socket created ({})", family);

    set_reuse_address(&socket);
    bind(&socket, &endpoint)?;
    log::info!(target: TARGET, "open_stream: listening on ip {} and port: {}", ip, port);

    match socket.send_buffer_size() {
        Ok(size) => log::info!(target: TARGET, "open_stream: socket send queue size: {}", size),
        Err(e) => log::warn!(target: TARGET, "open_stream: cannot read SO_SNDBUF: {}", e),
    }

    if let Err(source) = socket.listen(LISTEN_BACKLOG) {
        log::warn!(
            target: TARGET,
            "open_stream: listen() failed with error {:?}: {}",
            source.raw_os_error(),
            source
        );
        return Err(TransportError::ListenFailed { source });
    }

    Ok(socket.into())
}

/// Open the socket used for multicast fan-out.
pub fn open_datagram(
    family: AddressFamily,
    ip: &str,
    port: u16,
    recv_buffer_size: usize,
) -> Result<UdpSocket> {
    log::info!(target: TARGET, "open_datagram: ip is {}", ip);
    let endpoint = EndpointAddress::resolve(family, ip, port)?;
    let socket = create(family, Type::DGRAM, Protocol::UDP)?;
    log::info!(target: TARGET, "open_datagram: socket udp created ({})", family);

    set_reuse_address(&socket);
    if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
        log::warn!(
            target: TARGET,
            "open_datagram: setsockopt(SO_RCVBUF, {}) error {:?}: {}",
            recv_buffer_size,
            e.raw_os_error(),
            e
        );
    } else if let Ok(actual) = socket.recv_buffer_size() {
        log::info!(target: TARGET, "open_datagram: receive buffer size: {}", actual);
    }

    bind(&socket, &endpoint)?;
    Ok(socket.into())
}

fn create(family: AddressFamily, ty: Type, protocol: Protocol) -> Result<Socket> {
    Socket::new(family.domain(), ty, Some(protocol)).map_err(|source| {
        log::warn!(
            target: TARGET,
            "socket() error {:?}: {}",
            source.raw_os_error(),
            source
        );
        TransportError::SocketCreateFailed { source }
    })
}

fn set_reuse_address(socket: &Socket) {
    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!(
            target: TARGET,
            "setsockopt(SO_REUSEADDR) error {:?}: {}",
            e.raw_os_error(),
            e
        );
    }
}

fn bind(socket: &Socket, endpoint: &EndpointAddress) -> Result<()> {
    let addr = endpoint.socket_addr();
    socket.bind(&addr.into()).map_err(|source| {
        log::warn!(
            target: TARGET,
            "bind() to {} error {:?}: {}",
            addr,
            source.raw_os_error(),
            source
        );
        TransportError::BindFailed { addr, source }
    })
}
