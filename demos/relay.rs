//! Minimal relay: accepts stream clients and pushes a text record to every
//! client (and the multicast group, when enabled) once per second.
//!
//! Usage: `dlt-relay [config.json]`

use dlt_transport::{logging, DaemonConfig, Delivery, PayloadPair};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => DaemonConfig::load(&path)?,
        None => DaemonConfig::default(),
    };
    logging::init(config.log_level);

    let delivery = Delivery::open(&config)?;
    delivery.listener().set_nonblocking(true)?;
    log::info!("relay listening on {}", delivery.local_addr()?);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mut clients: Vec<TcpStream> = Vec::new();
    let mut seq: u32 = 0;
    let mut next_tick = Instant::now();

    while running.load(Ordering::SeqCst) {
        match delivery.listener().accept() {
            Ok((stream, peer)) => {
                // Sends block until the whole record is accepted.
                stream.set_nonblocking(false)?;
                log::info!("client connected: {}", peer);
                clients.push(stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => log::warn!("accept failed: {}", e),
        }

        if Instant::now() >= next_tick {
            next_tick += Duration::from_secs(1);
            seq = seq.wrapping_add(1);

            let header = seq.to_be_bytes();
            let body = format!("relay tick {}", seq);
            let payload = PayloadPair::new(&header, body.as_bytes());

            clients.retain_mut(|client| match delivery.send_to_client(client, &payload) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("dropping client: {}", e);
                    false
                }
            });
            delivery.multicast(&header, body.as_bytes());
        }

        thread::sleep(Duration::from_millis(10));
    }

    log::info!("shutting down, {} client(s) connected", clients.len());
    drop(clients);
    delivery.close();
    Ok(())
}
