//! # Daemon Delivery
//!
//! Everything the daemon needs to push records out, opened from one
//! [`DaemonConfig`]: the stream listener clients connect to, and the
//! optional multicast socket with its destination.
//!
//! ## Lifecycle
//!
//! 1. Open: `Delivery::open(&config)`
//! 2. Accept clients on `delivery.listener()` (bookkeeping is the caller's)
//! 3. Per record: `send_to_client` for each client, `multicast` once
//! 4. Shut down: `delivery.close()`

use crate::config::DaemonConfig;
use crate::transport::address::AddressFamily;
use crate::transport::binder;
use crate::transport::error::Result;
use crate::transport::multicast::MulticastState;
use crate::transport::payload::PayloadPair;
use crate::transport::stream;
use std::io::Write;
use std::net::{SocketAddr, TcpListener};

const TARGET: &str = "dlt_transport::daemon";

pub struct Delivery {
    listener: TcpListener,
    multicast: Option<MulticastState>,
    serial_header: bool,
}

impl Delivery {
    /// Open with the address family compiled into this build.
    pub fn open(config: &DaemonConfig) -> Result<Self> {
        Self::open_with_family(AddressFamily::ACTIVE, config)
    }

    pub fn open_with_family(family: AddressFamily, config: &DaemonConfig) -> Result<Self> {
        let listener = binder::open_stream(family, &config.stream.ip, config.stream.port)?;

        let multicast = if config.udp.enabled {
            Some(MulticastState::setup(family, &config.udp)?)
        } else {
            log::debug!(target: TARGET, "udp connection disabled");
            None
        };

        Ok(Delivery {
            listener,
            multicast,
            serial_header: config.stream.serial_header,
        })
    }

    pub fn listener(&self) -> &TcpListener {
        &self.listener
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn serial_header(&self) -> bool {
        self.serial_header
    }

    /// Deliver one record to a connected client.
    pub fn send_to_client<W: Write + ?Sized>(
        &self,
        client: &mut W,
        payload: &PayloadPair<'_>,
    ) -> Result<()> {
        stream::send_message(client, self.serial_header, payload)
    }

    /// Fan one record out to the multicast group, if UDP is enabled.
    pub fn multicast(&self, first: &[u8], second: &[u8]) {
        match &self.multicast {
            Some(state) => state.send(first, second),
            None => log::trace!(target: TARGET, "multicast skipped: udp disabled"),
        }
    }

    pub fn multicast_state(&self) -> Option<&MulticastState> {
        self.multicast.as_ref()
    }

    /// Hand the multicast state to another owner, e.g. a
    /// [`MulticastDispatcher`](crate::transport::MulticastDispatcher).
    pub fn take_multicast(&mut self) -> Option<MulticastState> {
        self.multicast.take()
    }

    pub fn close(self) {
        if let Some(state) = self.multicast {
            state.close();
        }
        match self.listener.local_addr() {
            Ok(addr) => log::info!(target: TARGET, "closing listener on {}", addr),
            Err(_) => log::info!(target: TARGET, "closing listener"),
        }
    }
}
