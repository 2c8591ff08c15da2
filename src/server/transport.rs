//! Channel-backed transport bridging dispatch to the socket task.
//!
//! # Responsibilities
//! - Queue outbound frames from handler code, which runs synchronously
//! - Hand the queue's receiving end to the socket's writer task
//! - Track liveness so dispatch can observe a close before the socket does
//!
//! # Design Decisions
//! - Unbounded queue: handlers never block on a slow peer; the writer task
//!   applies backpressure at the socket instead
//! - `close()` flips the liveness flag before queueing the close frame, so a
//!   pre-handshake hook that closes is visible to admission immediately

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::dispatch::{Transport, TransportError};

/// One outbound frame queued by dispatch.
#[derive(Debug)]
pub enum OutFrame {
    Text(String),
    Binary(Bytes),
    Close,
}

/// Transport implementation backed by an in-process frame queue.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutFrame>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<OutFrame>>>,
    active: AtomicBool,
    remote: Option<SocketAddr>,
}

impl ChannelTransport {
    pub fn new(remote: Option<SocketAddr>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            active: AtomicBool::new(true),
            remote,
        }
    }

    /// Take the receiving end of the frame queue. Yields once; the writer
    /// task owns it afterwards.
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<OutFrame>> {
        match self.rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn push(&self, frame: OutFrame) -> Result<(), TransportError> {
        if !self.is_active() {
            return Err(TransportError::Closed);
        }
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

impl Transport for ChannelTransport {
    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.push(OutFrame::Text(text.to_owned()))
    }

    fn send_binary(&self, data: Bytes) -> Result<(), TransportError> {
        self.push(OutFrame::Binary(data))
    }

    fn close(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            let _ = self.tx.send(OutFrame::Close);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_arrive_in_send_order() {
        let transport = ChannelTransport::new(None);
        let mut rx = transport.take_receiver().unwrap();

        transport.send_text("one").unwrap();
        transport.send_binary(Bytes::from_static(b"two")).unwrap();
        transport.close();

        assert!(matches!(rx.try_recv().unwrap(), OutFrame::Text(t) if t == "one"));
        assert!(matches!(rx.try_recv().unwrap(), OutFrame::Binary(b) if b.as_ref() == b"two"));
        assert!(matches!(rx.try_recv().unwrap(), OutFrame::Close));
    }

    #[test]
    fn sends_after_close_fail() {
        let transport = ChannelTransport::new(None);
        transport.close();
        assert!(!transport.is_active());
        assert!(matches!(transport.send_text("late"), Err(TransportError::Closed)));
        // Close is idempotent.
        transport.close();
    }

    #[test]
    fn receiver_is_yielded_once() {
        let transport = ChannelTransport::new(None);
        assert!(transport.take_receiver().is_some());
        assert!(transport.take_receiver().is_none());
    }
}
