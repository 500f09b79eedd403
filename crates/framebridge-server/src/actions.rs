//! Named action handlers.

use framebridge_core::ErrorPayload;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A type-erased handler: JSON in, JSON or a wire error out.
pub type Handler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ErrorPayload>> + Send + Sync>;

/// The actions a responder exposes, looked up by name at dispatch time.
#[derive(Clone, Default)]
pub struct Actions {
    handlers: HashMap<String, Handler>,
}

impl Actions {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous one.
    ///
    /// The request payload is decoded into `A`; a payload that does not fit
    /// is answered with an error without calling the handler.
    pub fn register<A, R, F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let name = name.into();
        let action = name.clone();
        let handler = Arc::new(handler);
        let erased: Handler = Arc::new(move |data: Value| {
            let handler = handler.clone();
            let action = action.clone();
            async move {
                let args: A = serde_json::from_value(data).map_err(|e| {
                    ErrorPayload::new(format!("Invalid payload for action \"{action}\": {e}"))
                })?;
                let result = handler(args).await.map_err(error_payload)?;
                serde_json::to_value(result).map_err(|e| {
                    ErrorPayload::new(format!("Result of action \"{action}\" is not serializable: {e}"))
                })
            }
            .boxed()
        });
        self.handlers.insert(name, erased);
        self
    }

    /// The handler registered under `name`.
    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered action names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no action is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Actions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Convert a handler failure into its wire form.
///
/// The message is the outermost error; the cause chain (and a backtrace,
/// when one was captured) goes into `stack`.
pub(crate) fn error_payload(err: anyhow::Error) -> ErrorPayload {
    let message = err.to_string();
    let trace = format!("{err:?}");
    let payload = ErrorPayload::new(message.clone());
    if trace != message {
        payload.with_stack(trace)
    } else {
        payload
    }
}
