//! The initiator endpoint.

use crate::timer::Timer;
use crate::{ClientConfig, ClientError};
use framebridge_core::{
    HandshakeMessage, Message, MessageChannel, MessagePort, NodeId, PortReceiver, Request,
    Response,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

type Outcome = Result<Value, ClientError>;

/// Connection lifecycle state of a [`BridgeClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake sent, waiting for the acknowledgment.
    Connecting,
    /// Acknowledged by the responder.
    Connected,
    /// Torn down by [`BridgeClient::destroy`].
    Destroyed,
}

/// A call waiting for its response.
struct PendingCall {
    reply: oneshot::Sender<Outcome>,
    timer: Timer,
}

/// State shared between the client handle, its listener and its timers.
struct Shared {
    source: NodeId,
    destination: NodeId,
    port: MessagePort,
    state: watch::Sender<ConnectionState>,
    pending: Mutex<HashMap<String, PendingCall>>,
}

impl Shared {
    fn handle_message(&self, value: Value) {
        let response = match Message::from_value(value) {
            Ok(Message::Response(response)) => response,
            Ok(Message::Request(request)) => {
                tracing::debug!("[{}] Ignoring inbound request: {}", self.source, request.id);
                return;
            }
            Err(e) => {
                tracing::debug!("[{}] Ignoring malformed message: {}", self.source, e);
                return;
            }
        };

        if response.is_ack() && self.mark_connected() {
            tracing::info!("[{}] Connected to server: {}", self.source, response.source);
            return;
        }

        self.settle(response);
    }

    /// Move from connecting to connected. Returns false in any other state.
    fn mark_connected(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected;
                true
            } else {
                false
            }
        })
    }

    fn settle(&self, response: Response) {
        let Some(call) = self.pending.lock().remove(&response.id) else {
            tracing::debug!("[{}] No pending call for response: {}", self.source, response.id);
            return;
        };
        call.timer.disarm();
        let outcome = response.into_outcome().map_err(ClientError::Remote);
        let _ = call.reply.send(outcome);
    }

    fn expire(&self, id: &str, after: Duration) {
        if let Some(call) = self.pending.lock().remove(id) {
            tracing::debug!("[{}] Request timed out: {}", self.source, id);
            let _ = call.reply.send(Err(ClientError::Timeout(after)));
        }
    }
}

/// A connection from this context to a responder.
///
/// Created by [`init`]. Requests are multiplexed over one dedicated channel
/// and complete in the order their responses arrive.
pub struct BridgeClient {
    shared: Arc<Shared>,
    default_timeout: Duration,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Open a channel to the responder in `config.server_frame`.
///
/// The handshake is sent once. Until the responder acknowledges it every
/// request fails with [`ClientError::NotConnected`]; there is no retry.
/// Must be called from within a tokio runtime.
pub fn init(config: ClientConfig) -> Result<BridgeClient, ClientError> {
    let source = NodeId::new(config.source_name)?;
    let destination = NodeId::new(config.destination_name)?;

    let channel = MessageChannel::new();
    let receiver = channel.port1.start()?;

    config.server_frame.post_message(
        &HandshakeMessage::init(source.as_str()),
        &config.target_origin,
        vec![channel.port2],
    )?;

    let (state, _) = watch::channel(ConnectionState::Connecting);
    let shared = Arc::new(Shared {
        source,
        destination,
        port: channel.port1,
        state,
        pending: Mutex::new(HashMap::new()),
    });
    let listener = tokio::spawn(listen(shared.clone(), receiver));

    tracing::debug!(
        "[{}] Handshake sent to server {} at {}",
        shared.source,
        shared.destination,
        config.target_origin
    );

    Ok(BridgeClient {
        shared,
        default_timeout: config.default_timeout,
        listener: Mutex::new(Some(listener)),
    })
}

async fn listen(shared: Arc<Shared>, mut receiver: PortReceiver) {
    while let Some(value) = receiver.recv().await {
        shared.handle_message(value);
    }
    tracing::debug!("[{}] Channel closed", shared.source);
}

impl BridgeClient {
    /// This endpoint's name.
    pub fn source(&self) -> &NodeId {
        &self.shared.source
    }

    /// The responder this client talks to.
    pub fn destination(&self) -> &NodeId {
        &self.shared.destination
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Whether the handshake was acknowledged and the client is not destroyed.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Wait until the responder acknowledges the handshake.
    ///
    /// Returns [`ClientError::Destroyed`] as soon as the client is torn down.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), ClientError> {
        let mut state = self.shared.state.subscribe();
        let settled = state.wait_for(|s| *s != ConnectionState::Connecting);
        match tokio::time::timeout(timeout, settled).await {
            Ok(Ok(state)) if *state == ConnectionState::Connected => Ok(()),
            Ok(_) => Err(ClientError::Destroyed),
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }

    /// Number of calls still waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Call `action` with the default timeout.
    pub async fn request<T, R>(&self, action: &str, data: T) -> Result<R, ClientError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        self.request_with_timeout(action, data, self.default_timeout)
            .await
    }

    /// Call `action`, failing with [`ClientError::Timeout`] if no response
    /// arrives within `timeout`.
    pub async fn request_with_timeout<T, R>(
        &self,
        action: &str,
        data: T,
        timeout: Duration,
    ) -> Result<R, ClientError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        match self.state() {
            ConnectionState::Connected => {}
            ConnectionState::Connecting => return Err(ClientError::NotConnected),
            ConnectionState::Destroyed => return Err(ClientError::Destroyed),
        }
        let data = serde_json::to_value(data).map_err(ClientError::Encode)?;
        let reply = self.issue(action, data, timeout)?;
        let value = reply.await.map_err(|_| ClientError::Destroyed)??;
        serde_json::from_value(value).map_err(ClientError::Decode)
    }

    fn issue(
        &self,
        action: &str,
        data: Value,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Outcome>, ClientError> {
        if self.shared.port.is_closed() {
            return Err(ClientError::Destroyed);
        }

        let id = Uuid::new_v4().to_string();
        let message = Message::from(Request {
            id: id.clone(),
            source: self.shared.source.clone(),
            destination: self.shared.destination.clone(),
            action: action.to_string(),
            data,
        });
        let (reply, outcome) = oneshot::channel();

        {
            // The timer cannot observe the table before the call is in it.
            let mut pending = self.shared.pending.lock();
            let timer = {
                let shared: Weak<Shared> = Arc::downgrade(&self.shared);
                let id = id.clone();
                Timer::arm(timeout, move || {
                    if let Some(shared) = shared.upgrade() {
                        shared.expire(&id, timeout);
                    }
                })
            };
            pending.insert(id.clone(), PendingCall { reply, timer });
        }

        if let Err(e) = self.shared.port.post_message(&message) {
            if let Some(call) = self.shared.pending.lock().remove(&id) {
                call.timer.disarm();
            }
            return Err(e.into());
        }
        Ok(outcome)
    }

    /// Close the channel and reject every pending call with
    /// [`ClientError::Destroyed`].
    pub fn destroy(&self) {
        self.shared.state.send_replace(ConnectionState::Destroyed);
        self.shared.port.close();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }

        let calls: Vec<PendingCall> = self
            .shared
            .pending
            .lock()
            .drain()
            .map(|(_, call)| call)
            .collect();
        for call in calls {
            call.timer.disarm();
            let _ = call.reply.send(Err(ClientError::Destroyed));
        }
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.destroy();
    }
}
