use super::multicast::MulticastState;
use super::traits::DatagramSink;
use std::io;
use std::thread;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

const TARGET: &str = "dlt_transport::dispatch";

/// Records that may wait for the worker before new ones are dropped.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

struct Record {
    first: Vec<u8>,
    second: Vec<u8>,
}

/// Single owner of a [`MulticastState`], fed over a bounded channel.
///
/// Records are sent in submission order by one named worker thread, so
/// producers on any thread never touch the socket themselves. When the
/// socket stalls and the queue fills up, further records are dropped
/// rather than buffered.
pub struct MulticastDispatcher {
    sender: Option<mpsc::Sender<Record>>,
    closed: Option<oneshot::Receiver<()>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl MulticastDispatcher {
    pub fn spawn<S: DatagramSink + 'static>(state: MulticastState<S>) -> io::Result<Self> {
        Self::with_queue_depth(state, DEFAULT_QUEUE_DEPTH)
    }

    /// Like [`spawn`](Self::spawn) with an explicit queue depth (at least 1).
    pub fn with_queue_depth<S: DatagramSink + 'static>(
        state: MulticastState<S>,
        depth: usize,
    ) -> io::Result<Self> {
        let (sender, mut receiver) = mpsc::channel::<Record>(depth.max(1));
        let (done, closed) = oneshot::channel();

        let worker = thread::Builder::new()
            .name("dlt-multicast".to_string())
            .spawn(move || {
                // Ends once every sender is gone and the queue is drained.
                while let Some(record) = receiver.blocking_recv() {
                    state.send(&record.first, &record.second);
                }
                state.close();
                let _ = done.send(());
            })?;

        log::debug!(target: TARGET, "multicast dispatcher started (queue depth {})", depth.max(1));
        Ok(MulticastDispatcher {
            sender: Some(sender),
            closed: Some(closed),
            worker: Some(worker),
        })
    }

    /// Queue one record without blocking.
    ///
    /// Returns `false` when the record was not queued: the queue is full or
    /// the worker has stopped.
    pub fn submit(&self, first: Vec<u8>, second: Vec<u8>) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(Record { first, second }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!(target: TARGET, "multicast queue full, record dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Stop after the queued records; the receiver fires once the socket is closed.
    pub fn shutdown(mut self) -> oneshot::Receiver<()> {
        self.sender.take();
        // Detach: the caller waits on the receiver instead of joining.
        self.worker.take();
        self.closed.take().unwrap_or_else(|| oneshot::channel().1)
    }
}

impl Drop for MulticastDispatcher {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!(target: TARGET, "multicast worker panicked");
            }
        }
    }
}
