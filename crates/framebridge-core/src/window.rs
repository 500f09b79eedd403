//! Execution contexts and the broad message surface between them.
//!
//! A [`Window`] is a context with an origin. Other contexts reach it through a
//! [`WindowProxy`], which stamps every posted message with the sender's
//! origin. Listeners are explicit [`Subscription`]s owned by whoever
//! subscribed; dropping one unregisters it.

use crate::channel::{ChannelError, MessagePort};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Target origin that matches any context.
pub const ANY_ORIGIN: &str = "*";

/// A message delivered on a window's broad surface.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// Origin of the context that posted the message.
    pub origin: String,
    /// Copy of the posted message.
    pub data: Value,
    /// Ports transferred with the message.
    pub ports: Vec<MessagePort>,
}

struct WindowInner {
    origin: String,
    listeners: Mutex<HashMap<u64, mpsc::UnboundedSender<MessageEvent>>>,
    next_listener: AtomicU64,
}

/// An execution context.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

impl Window {
    /// A window at `origin` with no listeners.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(WindowInner {
                origin: origin.into(),
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Origin this window was created with.
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// Start listening for messages posted to this window.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.listeners.lock().insert(id, tx);
        Subscription {
            handle: SubscriptionHandle {
                id,
                window: Arc::downgrade(&self.inner),
            },
            rx,
        }
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// This window as seen from `viewer`.
    pub fn reference_from(&self, viewer: &Window) -> WindowProxy {
        WindowProxy {
            target: self.clone(),
            source_origin: viewer.origin().to_string(),
        }
    }

    fn dispatch(&self, event: MessageEvent) {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("origin", &self.inner.origin)
            .finish()
    }
}

/// A handle one context holds on another.
#[derive(Debug, Clone)]
pub struct WindowProxy {
    target: Window,
    source_origin: String,
}

impl WindowProxy {
    /// Origin of the referenced window.
    pub fn origin(&self) -> &str {
        self.target.origin()
    }

    /// Post `message` to the referenced window, transferring `transfer`.
    ///
    /// The message is delivered only if `target_origin` is [`ANY_ORIGIN`] or
    /// equals the window's origin; otherwise it is silently dropped, along
    /// with the ports.
    pub fn post_message<T: Serialize + ?Sized>(
        &self,
        message: &T,
        target_origin: &str,
        transfer: Vec<MessagePort>,
    ) -> Result<(), ChannelError> {
        let data = serde_json::to_value(message)?;
        if target_origin != ANY_ORIGIN && target_origin != self.target.origin() {
            tracing::debug!(
                "Target origin mismatch ({} != {}), message dropped",
                target_origin,
                self.target.origin()
            );
            return Ok(());
        }
        self.target.dispatch(MessageEvent {
            origin: self.source_origin.clone(),
            data,
            ports: transfer,
        });
        Ok(())
    }
}

/// A registered listener on a [`Window`].
pub struct Subscription {
    handle: SubscriptionHandle,
    rx: mpsc::UnboundedReceiver<MessageEvent>,
}

impl Subscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once the listener has been removed or the window is
    /// gone.
    pub async fn recv(&mut self) -> Option<MessageEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is already queued.
    pub fn try_recv(&mut self) -> Option<MessageEvent> {
        self.rx.try_recv().ok()
    }

    /// A handle that can remove this listener while something else owns it.
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Remove the listener. Equivalent to dropping it.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

/// Removes a [`Subscription`]'s registration.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: u64,
    window: Weak<WindowInner>,
}

impl SubscriptionHandle {
    /// Unregister the listener. Its pending `recv` returns `None` once the
    /// events already queued have been taken.
    pub fn unsubscribe(&self) {
        if let Some(window) = self.window.upgrade() {
            window.listeners.lock().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageChannel;
    use serde_json::json;

    #[tokio::test]
    async fn event_carries_sender_origin_and_ports() {
        let host = Window::new("http://host");
        let frame = Window::new("http://frame");
        let mut sub = host.subscribe();

        let channel = MessageChannel::new();
        host.reference_from(&frame)
            .post_message(&json!("hi"), "http://host", vec![channel.port2])
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.origin, "http://frame");
        assert_eq!(event.data, json!("hi"));
        assert_eq!(event.ports.len(), 1);
    }

    #[test]
    fn wrong_target_origin_is_dropped() {
        let host = Window::new("http://host");
        let frame = Window::new("http://frame");
        let mut sub = host.subscribe();

        let proxy = host.reference_from(&frame);
        proxy.post_message(&json!(1), "http://elsewhere", vec![]).unwrap();
        assert!(sub.try_recv().is_none());

        proxy.post_message(&json!(2), ANY_ORIGIN, vec![]).unwrap();
        assert_eq!(sub.try_recv().unwrap().data, json!(2));
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let host = Window::new("http://host");
        let a = host.subscribe();
        let b = host.subscribe();
        assert_eq!(host.listener_count(), 2);
        a.unsubscribe();
        drop(b);
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test]
    async fn handle_ends_owned_subscription() {
        let host = Window::new("http://host");
        let frame = Window::new("http://frame");
        let mut sub = host.subscribe();
        let handle = sub.handle();

        host.reference_from(&frame)
            .post_message(&json!("queued"), ANY_ORIGIN, vec![])
            .unwrap();
        handle.unsubscribe();
        assert_eq!(host.listener_count(), 0);

        assert_eq!(sub.recv().await.unwrap().data, json!("queued"));
        assert!(sub.recv().await.is_none());
    }
}
