//! Reliable delivery over a connected stream socket.
//!
//! A single `write` may accept fewer bytes than offered; the sender keeps
//! offering the remaining tail until the whole span is accepted or the
//! socket reports a hard error. There is no timeout: a stalled peer blocks
//! the caller, which must set socket timeouts beforehand if it needs them.

use super::error::{Result, TransportError};
use super::payload::{segments, PayloadPair};
use std::io::{ErrorKind, Write};

const TARGET: &str = "dlt_transport::stream";

/// Marker prepended to a message when the serial header is enabled.
pub const SERIAL_HEADER: [u8; 4] = *b"DLS\x01";

/// Write all of `data` to `sink`, retrying partial writes.
///
/// On failure the error carries how many bytes of `data` were accepted
/// before the socket gave up.
pub fn send_reliable<W: Write + ?Sized>(sink: &mut W, data: &[u8]) -> Result<usize> {
    let mut sent = 0;

    while sent < data.len() {
        match sink.write(&data[sent..]) {
            Ok(accepted) => sent += accepted,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                log::warn!(
                    target: TARGET,
                    "send_reliable: socket send failed [errno: {:?}] after {} of {} bytes: {}",
                    source.raw_os_error(),
                    sent,
                    data.len(),
                    source
                );
                return Err(TransportError::SendFailed {
                    bytes_sent: sent,
                    source,
                });
            }
        }
    }

    Ok(sent)
}

/// Send one logical message: `marker` (if any), then the payload halves.
///
/// Each segment completes before the next starts. A failing segment stops
/// the message; earlier segments are already on the wire.
pub fn send<W: Write + ?Sized>(
    sink: &mut W,
    marker: Option<&[u8]>,
    payload: &PayloadPair<'_>,
) -> Result<()> {
    for segment in segments(marker, payload) {
        send_reliable(sink, segment)?;
    }
    Ok(())
}

/// [`send`] with the standard [`SERIAL_HEADER`] when `serial_header` is set.
pub fn send_message<W: Write + ?Sized>(
    sink: &mut W,
    serial_header: bool,
    payload: &PayloadPair<'_>,
) -> Result<()> {
    let marker = serial_header.then_some(SERIAL_HEADER.as_slice());
    send(sink, marker, payload)
}
