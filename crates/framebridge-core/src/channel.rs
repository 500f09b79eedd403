//! Dedicated two-ended channels.
//!
//! A [`MessageChannel`] produces two entangled [`MessagePort`]s. Whatever one
//! port posts arrives, as a copy, at the other. Ports are handles: clones
//! refer to the same port, so one can be transferred through a handshake
//! while the sender keeps nothing.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};

/// Error using a channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The message could not be copied into a transferable value.
    #[error("message could not be cloned: {0}")]
    DataClone(#[from] serde_json::Error),
    /// The receiving side was already taken, or the port is closed.
    #[error("port has already been started or closed")]
    NotStartable,
}

/// A freshly allocated pair of entangled ports.
pub struct MessageChannel {
    /// The end kept by whoever opened the channel.
    pub port1: MessagePort,
    /// The end handed to the other side.
    pub port2: MessagePort,
}

impl MessageChannel {
    /// A fresh pair of entangled ports.
    pub fn new() -> Self {
        let (to_port1, port1_inbox) = mpsc::unbounded_channel();
        let (to_port2, port2_inbox) = mpsc::unbounded_channel();
        Self {
            port1: MessagePort::entangled(to_port2, port1_inbox),
            port2: MessagePort::entangled(to_port1, port2_inbox),
        }
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

struct PortInner {
    outbox: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
    closed: AtomicBool,
    closing: Notify,
}

/// One end of a [`MessageChannel`].
#[derive(Clone)]
pub struct MessagePort {
    inner: Arc<PortInner>,
}

impl MessagePort {
    fn entangled(
        outbox: mpsc::UnboundedSender<Value>,
        inbox: mpsc::UnboundedReceiver<Value>,
    ) -> Self {
        Self {
            inner: Arc::new(PortInner {
                outbox: Mutex::new(Some(outbox)),
                inbox: Mutex::new(Some(inbox)),
                closed: AtomicBool::new(false),
                closing: Notify::new(),
            }),
        }
    }

    /// Copy `message` to the other end.
    ///
    /// Posting on a closed port, or to a peer that has gone away, succeeds
    /// and delivers nothing.
    pub fn post_message<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ChannelError> {
        let value = serde_json::to_value(message)?;
        self.post_value(value);
        Ok(())
    }

    /// Post an already copied value.
    pub fn post_value(&self, value: Value) {
        let outbox = self.inner.outbox.lock();
        match outbox.as_ref() {
            Some(tx) => {
                if tx.send(value).is_err() {
                    tracing::debug!("Peer port is gone, message dropped");
                }
            }
            None => tracing::debug!("Port is closed, message dropped"),
        }
    }

    /// Take the receiving side of this port.
    ///
    /// Fails if the port was already started or has been closed.
    pub fn start(&self) -> Result<PortReceiver, ChannelError> {
        let rx = self
            .inner
            .inbox
            .lock()
            .take()
            .ok_or(ChannelError::NotStartable)?;
        Ok(PortReceiver {
            port: self.inner.clone(),
            rx,
        })
    }

    /// Disentangle the port. Further posts in either direction are dropped.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.outbox.lock().take();
        self.inner.inbox.lock().take();
        self.inner.closing.notify_waiters();
    }

    /// Whether `close` has been called on this port.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Whether two handles refer to the same port.
    pub fn same_port(&self, other: &MessagePort) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MessagePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePort")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The receiving side of a started port.
pub struct PortReceiver {
    port: Arc<PortInner>,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl PortReceiver {
    /// Wait for the next message.
    ///
    /// Returns `None` once this port is closed or the peer has closed and
    /// everything it sent has been received.
    pub async fn recv(&mut self) -> Option<Value> {
        let closing = self.port.closing.notified();
        if self.port.closed.load(Ordering::SeqCst) {
            return None;
        }
        tokio::select! {
            biased;
            _ = closing => None,
            msg = self.rx.recv() => msg,
        }
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Value> {
        if self.port.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_copies_both_ways() {
        let channel = MessageChannel::new();
        let mut rx1 = channel.port1.start().unwrap();
        let mut rx2 = channel.port2.start().unwrap();

        channel.port1.post_message(&json!({"n": 1})).unwrap();
        channel.port2.post_message(&json!("pong")).unwrap();

        assert_eq!(rx2.recv().await, Some(json!({"n": 1})));
        assert_eq!(rx1.recv().await, Some(json!("pong")));
    }

    #[tokio::test]
    async fn start_is_once() {
        let channel = MessageChannel::new();
        assert!(channel.port1.start().is_ok());
        assert!(matches!(
            channel.port1.clone().start(),
            Err(ChannelError::NotStartable)
        ));
    }

    #[tokio::test]
    async fn close_ends_both_directions() {
        let channel = MessageChannel::new();
        let mut rx1 = channel.port1.start().unwrap();
        let mut rx2 = channel.port2.start().unwrap();

        channel.port1.close();
        assert!(channel.port1.is_closed());

        // Posting on a closed port is a no-op.
        channel.port1.post_message(&json!(1)).unwrap();
        assert_eq!(rx2.recv().await, None);

        // So is posting to it.
        channel.port2.post_message(&json!(2)).unwrap();
        assert_eq!(rx1.recv().await, None);
    }

    #[tokio::test]
    async fn close_wakes_pending_receiver() {
        let channel = MessageChannel::new();
        let mut rx = channel.port1.start().unwrap();
        let port = channel.port1.clone();
        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        port.close();
        assert_eq!(waiter.await.unwrap(), None);
    }
}
