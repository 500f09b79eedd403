//! The responder endpoint.

use crate::actions::Actions;
use crate::{ServerConfig, ServerError};
use framebridge_core::{
    ErrorPayload, HandshakeMessage, Message, MessageEvent, MessagePort, NodeId, PortReceiver,
    Request, Response, Subscription, SubscriptionHandle, Window,
};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// The peer a responder is currently bound to.
struct Binding {
    peer: NodeId,
    port: MessagePort,
    listener: JoinHandle<()>,
}

impl Binding {
    fn close(self) {
        self.port.close();
        self.listener.abort();
    }
}

struct Shared {
    source: NodeId,
    allowed_origins: HashSet<String>,
    allowed_clients: HashSet<String>,
    actions: Actions,
    binding: Mutex<Option<Binding>>,
    destroyed: AtomicBool,
}

impl Shared {
    fn handle_handshake(self: &Arc<Self>, event: MessageEvent) {
        if !self.allowed_origins.contains(&event.origin) {
            tracing::error!(
                "[{}] Discarding message from untrusted origin: {}",
                self.source,
                event.origin
            );
            return;
        }

        let handshake = match serde_json::from_value::<HandshakeMessage>(event.data) {
            Ok(handshake) => handshake,
            Err(e) => {
                tracing::debug!("[{}] Ignoring non-handshake message: {}", self.source, e);
                return;
            }
        };
        let Some(port) = event.ports.into_iter().next() else {
            tracing::debug!("[{}] Ignoring handshake without a port", self.source);
            return;
        };

        let client = handshake.source_name();
        if !self.allowed_clients.contains(client) {
            tracing::error!(
                "[{}] Discarding message from unallowed client: {}",
                self.source,
                client
            );
            return;
        }
        let peer = match NodeId::new(client) {
            Ok(peer) => peer,
            Err(e) => {
                tracing::error!("[{}] Allowed client has an invalid name: {}", self.source, e);
                return;
            }
        };

        self.bind(peer, port);
    }

    /// Take ownership of `port` as the channel to `peer` and acknowledge.
    ///
    /// A later handshake replaces the binding: the previous port is closed
    /// and its traffic stops being dispatched.
    fn bind(self: &Arc<Self>, peer: NodeId, port: MessagePort) {
        let receiver = match port.start() {
            Ok(receiver) => receiver,
            Err(e) => {
                tracing::warn!("[{}] Cannot use port from client {}: {}", self.source, peer, e);
                return;
            }
        };

        let previous = {
            let mut binding = self.binding.lock();
            if self.destroyed.load(Ordering::SeqCst) {
                port.close();
                return;
            }
            let listener = tokio::spawn(dispatch(
                self.clone(),
                peer.clone(),
                port.clone(),
                receiver,
            ));
            binding.replace(Binding {
                peer: peer.clone(),
                port: port.clone(),
                listener,
            })
        };
        if let Some(previous) = previous {
            tracing::warn!(
                "[{}] Replacing bound client {} with {}",
                self.source,
                previous.peer,
                peer
            );
            previous.close();
        }

        let ack = Message::from(Response::ack(self.source.clone(), peer.clone()));
        if let Err(e) = port.post_message(&ack) {
            tracing::warn!("[{}] Failed to acknowledge client {}: {}", self.source, peer, e);
            return;
        }
        tracing::info!("[{}] Connection established with client: {}", self.source, peer);
    }

    /// Run the named action and build the one response owed for `request`.
    async fn respond(&self, request: Request) -> Response {
        let Request {
            id,
            source,
            action,
            data,
            ..
        } = request;

        let outcome = match self.actions.get(&action) {
            Some(handler) => AssertUnwindSafe(async move { handler(data).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(panicked(&action, panic))),
            None => Err(ErrorPayload::new(format!(
                "Action \"{}\" not found on server \"{}\".",
                action, self.source
            ))),
        };

        match outcome {
            Ok(data) => Response::success(id, self.source.clone(), source, data),
            Err(error) => {
                tracing::debug!("[{}] Action \"{}\" failed: {}", self.source, action, error);
                Response::failure(id, self.source.clone(), source, error)
            }
        }
    }
}

fn panicked(action: &str, panic: Box<dyn Any + Send>) -> ErrorPayload {
    let payload = ErrorPayload::new(format!("Action \"{action}\" panicked"));
    if let Some(msg) = panic.downcast_ref::<&str>() {
        payload.with_stack(*msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        payload.with_stack(msg.as_str())
    } else {
        payload
    }
}

async fn accept_handshakes(shared: Arc<Shared>, mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        shared.handle_handshake(event);
    }
}

async fn dispatch(
    shared: Arc<Shared>,
    peer: NodeId,
    port: MessagePort,
    mut receiver: PortReceiver,
) {
    while let Some(value) = receiver.recv().await {
        let request = match Message::from_value(value) {
            Ok(Message::Request(request)) => request,
            Ok(Message::Response(response)) => {
                tracing::debug!("[{}] Ignoring inbound response: {}", shared.source, response.id);
                continue;
            }
            Err(e) => {
                tracing::debug!("[{}] Ignoring malformed message: {}", shared.source, e);
                continue;
            }
        };

        if request.source != peer || request.destination != shared.source {
            tracing::warn!(
                "[{}] Discarding message with invalid source/destination.",
                shared.source
            );
            continue;
        }

        // Handlers run unbounded and concurrently. The reply goes to the port
        // the request came in on, which may be closed by then.
        let shared = shared.clone();
        let port = port.clone();
        tokio::spawn(async move {
            let response = shared.respond(request).await;
            if let Err(e) = port.post_message(&Message::from(response)) {
                tracing::warn!("[{}] Failed to send response: {}", shared.source, e);
            }
        });
    }
    tracing::debug!("[{}] Channel to client {} closed", shared.source, peer);
}

/// A responder listening on a window.
///
/// Created by [`init`]. Accepts handshakes from allowed origins and clients,
/// binds to one client at a time, and answers its requests with the
/// registered [`Actions`].
pub struct BridgeServer {
    shared: Arc<Shared>,
    subscription: SubscriptionHandle,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Start accepting handshakes posted to `window`.
///
/// Must be called from within a tokio runtime.
pub fn init(
    window: &Window,
    config: ServerConfig,
    actions: Actions,
) -> Result<BridgeServer, ServerError> {
    let source = NodeId::new(config.source_name)?;
    let subscription = window.subscribe();
    let handle = subscription.handle();

    let shared = Arc::new(Shared {
        source,
        allowed_origins: config.allowed_origins.into_iter().collect(),
        allowed_clients: config.allowed_clients.into_iter().collect(),
        actions,
        binding: Mutex::new(None),
        destroyed: AtomicBool::new(false),
    });
    let listener = tokio::spawn(accept_handshakes(shared.clone(), subscription));

    tracing::debug!(
        "[{}] Listening for handshakes on {} with {} actions",
        shared.source,
        window.origin(),
        shared.actions.len()
    );

    Ok(BridgeServer {
        shared,
        subscription: handle,
        listener: Mutex::new(Some(listener)),
    })
}

impl BridgeServer {
    /// This endpoint's name.
    pub fn source(&self) -> &NodeId {
        &self.shared.source
    }

    /// The client currently bound, if any.
    pub fn peer(&self) -> Option<NodeId> {
        self.shared
            .binding
            .lock()
            .as_ref()
            .map(|binding| binding.peer.clone())
    }

    /// Close the bound channel and stop accepting handshakes.
    ///
    /// Handlers already running are left to finish; their responses are
    /// dropped.
    pub fn destroy(&self) {
        self.shared.destroyed.store(true, Ordering::SeqCst);
        let binding = self.shared.binding.lock().take();
        if let Some(binding) = binding {
            binding.close();
        }
        self.subscription.unsubscribe();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        self.destroy();
    }
}
