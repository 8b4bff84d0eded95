//! The `Messaging` interface: a service that can deliver messages.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::codec::DecodeOptions;
use crate::config::Config;
use crate::context::Context;
use crate::dispatch::{HandlerFuture, Method, MethodTable, ServiceReceiver, decode_arg, encode_value};
use crate::error::RpcError;
use crate::message::{PubMessage, ReplyMessage, RequestMessage};
use crate::transport::{Connector, DEFAULT_LINK_NAME, RpcMessage, Target, Transport};

#[cfg(test)]
#[path = "messaging.test.rs"]
mod tests;

/// Capability contract id shared by the messaging interfaces.
pub const MESSAGING_CONTRACT_ID: &str = "wasmcloud:messaging";

pub const MESSAGING_INTERFACE: &str = "Messaging";
pub const PUBLISH_METHOD: &str = "Publish";
pub const REQUEST_METHOD: &str = "Request";

/// The Messaging interface describes a service that can deliver messages.
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Publish - send a message.
    ///
    /// Returns once the message has been sent. If the sender expects an
    /// asynchronous reply, `reply_to` should carry the subject to answer on.
    async fn publish(&self, ctx: &Context, arg: PubMessage) -> Result<(), RpcError>;

    /// Request - send a message in a request/reply pattern, waiting for a
    /// response.
    async fn request(&self, ctx: &Context, arg: RequestMessage) -> Result<ReplyMessage, RpcError>;
}

fn handle_publish<'a>(
    svc: &'a (dyn Messaging + 'static),
    ctx: &'a Context,
    arg: &'a [u8],
    options: DecodeOptions,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let value: PubMessage = decode_arg(arg, options)?;
        svc.publish(ctx, value).await?;
        Ok(Bytes::new())
    })
}

fn handle_request<'a>(
    svc: &'a (dyn Messaging + 'static),
    ctx: &'a Context,
    arg: &'a [u8],
    options: DecodeOptions,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let value: RequestMessage = decode_arg(arg, options)?;
        let reply = svc.request(ctx, value).await?;
        encode_value(&reply)
    })
}

pub static MESSAGING_METHODS: MethodTable<dyn Messaging> = MethodTable {
    interface: MESSAGING_INTERFACE,
    contract_id: MESSAGING_CONTRACT_ID,
    methods: &[
        Method {
            name: PUBLISH_METHOD,
            handler: handle_publish,
        },
        Method {
            name: REQUEST_METHOD,
            handler: handle_request,
        },
    ],
};

/// Receives calls defined by the [`Messaging`] interface.
pub type MessagingReceiver = ServiceReceiver<dyn Messaging>;

impl ServiceReceiver<dyn Messaging> {
    /// Wraps a service implementation for registration with a
    /// [`Dispatcher`](crate::dispatch::Dispatcher).
    pub fn new(service: impl Messaging + 'static) -> Self {
        Self::from_arc(Arc::new(service))
    }

    pub fn from_arc(service: Arc<dyn Messaging>) -> Self {
        ServiceReceiver::from_parts(&MESSAGING_METHODS, service)
    }
}

/// Sends calls to a [`Messaging`] service over an injected transport.
#[derive(Clone)]
pub struct MessagingSender {
    transport: Box<dyn Transport>,
    options: DecodeOptions,
}

impl MessagingSender {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_boxed(Box::new(transport))
    }

    pub fn from_boxed(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            options: DecodeOptions::default(),
        }
    }

    /// A sender for the messaging provider on the `default` link.
    pub fn for_provider(connector: &dyn Connector) -> Self {
        Self::for_provider_link(connector, DEFAULT_LINK_NAME)
    }

    /// A sender for the messaging provider on the given link.
    pub fn for_provider_link(connector: &dyn Connector, link_name: &str) -> Self {
        let target = Target::provider(MESSAGING_CONTRACT_ID, link_name);
        Self::from_boxed(connector.connect(&target))
    }

    /// A sender for the provider and link named in `config`.
    pub fn from_config(connector: &dyn Connector, config: &Config) -> Self {
        Self::from_boxed(connector.connect(&config.provider_target()))
            .with_decode_options(config.decode_options())
    }

    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }
}

impl std::fmt::Debug for MessagingSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingSender")
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl Messaging for MessagingSender {
    #[tracing::instrument(skip_all, fields(subject = %arg.subject))]
    async fn publish(&self, ctx: &Context, arg: PubMessage) -> Result<(), RpcError> {
        let buf = encode_value(&arg)?;
        let msg = RpcMessage::new(format!("{MESSAGING_INTERFACE}.{PUBLISH_METHOD}"), buf);
        // The provider answers a publish with an empty payload.
        self.transport.send(ctx, msg).await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(subject = %arg.subject, timeout_ms = arg.timeout_ms))]
    async fn request(&self, ctx: &Context, arg: RequestMessage) -> Result<ReplyMessage, RpcError> {
        let buf = encode_value(&arg)?;
        let msg = RpcMessage::new(format!("{MESSAGING_INTERFACE}.{REQUEST_METHOD}"), buf);
        let out = self.transport.send(ctx, msg).await?;
        decode_arg(&out, self.options)
    }
}
