// Ports: one-directional, ordered, blocking integer channels between a VM
// instance and its environment

use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

/// Port errors
#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
pub enum PortError {
    /// The peer dropped its half and the queue is drained: end of stream.
    #[error("port closed by peer")]
    Closed,
    #[error("timed out waiting on port")]
    TimedOut,
}

/// Producer half of a port. Dropping it closes the port; a consumer blocked
/// on an empty, closed port observes `PortError::Closed` instead of waiting
/// forever.
pub struct PortSender {
    tx: Sender<i64>,
}

/// Consumer half of a port.
pub struct PortReceiver {
    rx: Receiver<i64>,
}

/// Create a port. Capacity 0 gives rendezvous semantics (a send waits for
/// the consumer); a non-zero capacity lets a driver pre-seed values before
/// the consuming instance starts, which is how cycles are kept from
/// deadlocking.
pub fn port(capacity: usize) -> (PortSender, PortReceiver) {
    let (tx, rx) = channel::bounded(capacity);
    (PortSender { tx }, PortReceiver { rx })
}

impl PortSender {
    /// Blocks until the value is accepted, or fails once the consumer is
    /// gone.
    pub fn send(&self, value: i64) -> Result<(), PortError> {
        self.tx.send(value).map_err(|_| PortError::Closed)
    }
}

impl PortReceiver {
    /// Blocks until a value arrives; `Closed` once the producer has dropped
    /// its half and the queue is drained.
    pub fn recv(&self) -> Result<i64, PortError> {
        self.rx.recv().map_err(|_| PortError::Closed)
    }

    /// Bounded wait, for drivers that must tell a slow producer from a dead
    /// one.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<i64, PortError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => PortError::TimedOut,
            RecvTimeoutError::Disconnected => PortError::Closed,
        })
    }

    /// Second consumer handle for a seeded cycle port. The ring driver keeps
    /// one end aside so the final circulated value survives the first
    /// instance halting, and only reads it after every instance has joined.
    pub(crate) fn tee(&self) -> PortReceiver {
        PortReceiver {
            rx: self.rx.clone(),
        }
    }
}

impl Iterator for PortReceiver {
    type Item = i64;

    /// Yields values until the producer closes the port.
    fn next(&mut self) -> Option<i64> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = port(3);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        assert_eq!(rx.recv(), Ok(1));
        assert_eq!(rx.recv(), Ok(2));
        assert_eq!(rx.recv(), Ok(3));
    }

    #[test]
    fn test_closed_after_producer_drop() {
        let (tx, rx) = port(2);
        tx.send(7).unwrap();
        drop(tx);
        // Buffered value still delivered, then end of stream.
        assert_eq!(rx.recv(), Ok(7));
        assert_eq!(rx.recv(), Err(PortError::Closed));
    }

    #[test]
    fn test_recv_timeout() {
        let (tx, rx) = port(1);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(PortError::TimedOut)
        );
        drop(tx);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(PortError::Closed)
        );
    }

    #[test]
    fn test_send_fails_after_consumer_drop() {
        let (tx, rx) = port(1);
        drop(rx);
        assert_eq!(tx.send(1), Err(PortError::Closed));
    }

    #[test]
    fn test_rendezvous_send_meets_recv() {
        let (tx, rx) = port(0);
        let producer = thread::spawn(move || tx.send(42));
        assert_eq!(rx.recv(), Ok(42));
        assert_eq!(producer.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_iterator_drains_until_close() {
        let (tx, mut rx) = port(4);
        for value in 0..4 {
            tx.send(value).unwrap();
        }
        drop(tx);
        assert_eq!(rx.by_ref().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }
}
