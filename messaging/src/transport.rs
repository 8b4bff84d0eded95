//! The boundary between senders and whatever delivers their bytes.
//!
//! A [`Transport`] takes a method name plus encoded argument and returns the
//! encoded result. Addressing, framing and retries all live behind it. The
//! [`LoopbackTransport`] delivers straight into an in-process [`Dispatcher`]
//! and is what the tests use to wire senders to receivers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::RpcError;

#[cfg(test)]
#[path = "transport.test.rs"]
mod tests;

/// Name of the link used when none is configured.
pub const DEFAULT_LINK_NAME: &str = "default";

/// Errors raised by a transport itself, as opposed to the remote handler.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Call was cancelled")]
    Cancelled,

    #[error("Target unreachable: {0}")]
    Unreachable(String),

    #[error("{0}")]
    Other(String),
}

/// A single call as seen by the transport: a method name and its encoded
/// argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcMessage {
    /// Qualified method name, `Interface.Method`.
    pub method: String,
    pub arg: Bytes,
}

impl RpcMessage {
    pub fn new(method: impl Into<String>, arg: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            arg: arg.into(),
        }
    }

    /// Splits `Interface.Method` into its parts. A name without an interface
    /// prefix yields `None` for the interface.
    pub fn split_method(&self) -> (Option<&str>, &str) {
        match self.method.split_once('.') {
            Some((interface, method)) => (Some(interface), method),
            None => (None, self.method.as_str()),
        }
    }
}

/// Delivers encoded calls and hands back the encoded result.
///
/// A failure on the remote side (including a handler error) must surface as
/// an `Err` here; senders only decode payloads from successful calls.
#[async_trait]
pub trait Transport: DynClone + Send + Sync {
    async fn send(&self, ctx: &Context, msg: RpcMessage) -> Result<Bytes, RpcError>;
}

dyn_clone::clone_trait_object!(Transport);

/// Where a sender's calls go.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// A capability provider, addressed by contract id and link name.
    Provider {
        contract_id: String,
        link_name: String,
    },
    /// Another actor, addressed by its public key.
    Actor { actor_id: String },
}

impl Target {
    pub fn provider(contract_id: impl Into<String>, link_name: impl Into<String>) -> Self {
        Target::Provider {
            contract_id: contract_id.into(),
            link_name: link_name.into(),
        }
    }

    pub fn actor(actor_id: impl Into<String>) -> Self {
        Target::Actor {
            actor_id: actor_id.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Provider {
                contract_id,
                link_name,
            } => write!(f, "provider://{}/{}", contract_id, link_name),
            Target::Actor { actor_id } => write!(f, "actor://{}", actor_id),
        }
    }
}

/// Produces transports for targets. Supplied by the host runtime.
pub trait Connector: Send + Sync {
    fn connect(&self, target: &Target) -> Box<dyn Transport>;
}

/// Delivers calls directly to an in-process [`Dispatcher`].
#[derive(Clone)]
pub struct LoopbackTransport {
    target: Option<Target>,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl LoopbackTransport {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            target: None,
            dispatcher: Some(dispatcher),
        }
    }

    /// A transport for a target nobody serves; every send fails.
    pub fn unreachable(target: Target) -> Self {
        Self {
            target: Some(target),
            dispatcher: None,
        }
    }

    fn describe_target(&self) -> String {
        self.target
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "loopback".to_string())
    }
}

impl fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("target", &self.describe_target())
            .field("connected", &self.dispatcher.is_some())
            .finish()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    #[tracing::instrument(
        name = "loopback",
        skip_all,
        fields(method = %msg.method, call_id = %ctx.call_id())
    )]
    async fn send(&self, ctx: &Context, msg: RpcMessage) -> Result<Bytes, RpcError> {
        let Some(dispatcher) = &self.dispatcher else {
            return Err(TransportError::Unreachable(self.describe_target()).into());
        };

        if ctx.is_cancelled() {
            return Err(TransportError::Cancelled.into());
        }

        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Err(RpcError::from(TransportError::Cancelled)),
            result = dispatcher.dispatch(ctx, &msg) => result,
        }
    }
}

/// A [`Connector`] that routes targets to in-process dispatchers.
#[derive(Default, Clone)]
pub struct LoopbackConnector {
    routes: HashMap<Target, Arc<Dispatcher>>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, target: Target, dispatcher: Arc<Dispatcher>) -> Self {
        self.routes.insert(target, dispatcher);
        self
    }
}

impl Connector for LoopbackConnector {
    fn connect(&self, target: &Target) -> Box<dyn Transport> {
        match self.routes.get(target) {
            Some(dispatcher) => Box::new(LoopbackTransport {
                target: Some(target.clone()),
                dispatcher: Some(dispatcher.clone()),
            }),
            None => {
                tracing::warn!(dest = %target, "no route for target");
                Box::new(LoopbackTransport::unreachable(target.clone()))
            }
        }
    }
}
