//! The `MessageSubscriber` interface, implemented by actors that receive
//! messages delivered by the messaging provider.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::codec::DecodeOptions;
use crate::context::Context;
use crate::dispatch::{HandlerFuture, Method, MethodTable, ServiceReceiver, decode_arg, encode_value};
use crate::error::RpcError;
use crate::message::SubMessage;
use crate::messaging::MESSAGING_CONTRACT_ID;
use crate::transport::{Connector, RpcMessage, Target, Transport};

#[cfg(test)]
#[path = "subscriber.test.rs"]
mod tests;

pub const MESSAGE_SUBSCRIBER_INTERFACE: &str = "MessageSubscriber";
pub const HANDLE_MESSAGE_METHOD: &str = "HandleMessage";

#[async_trait]
pub trait MessageSubscriber: Send + Sync {
    /// Subscription handler.
    async fn handle_message(&self, ctx: &Context, arg: SubMessage) -> Result<(), RpcError>;
}

fn handle_message<'a>(
    svc: &'a (dyn MessageSubscriber + 'static),
    ctx: &'a Context,
    arg: &'a [u8],
    options: DecodeOptions,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let value: SubMessage = decode_arg(arg, options)?;
        svc.handle_message(ctx, value).await?;
        Ok(Bytes::new())
    })
}

pub static MESSAGE_SUBSCRIBER_METHODS: MethodTable<dyn MessageSubscriber> = MethodTable {
    interface: MESSAGE_SUBSCRIBER_INTERFACE,
    contract_id: MESSAGING_CONTRACT_ID,
    methods: &[Method {
        name: HANDLE_MESSAGE_METHOD,
        handler: handle_message,
    }],
};

pub type MessageSubscriberReceiver = ServiceReceiver<dyn MessageSubscriber>;

impl ServiceReceiver<dyn MessageSubscriber> {
    pub fn new(service: impl MessageSubscriber + 'static) -> Self {
        Self::from_arc(Arc::new(service))
    }

    pub fn from_arc(service: Arc<dyn MessageSubscriber>) -> Self {
        ServiceReceiver::from_parts(&MESSAGE_SUBSCRIBER_METHODS, service)
    }
}

/// Delivers subscription messages to an actor implementing
/// [`MessageSubscriber`].
#[derive(Clone)]
pub struct MessageSubscriberSender {
    transport: Box<dyn Transport>,
}

impl MessageSubscriberSender {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_boxed(Box::new(transport))
    }

    pub fn from_boxed(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// A sender addressed to another actor by its public key.
    pub fn for_actor(connector: &dyn Connector, actor_id: &str) -> Self {
        Self::from_boxed(connector.connect(&Target::actor(actor_id)))
    }
}

impl std::fmt::Debug for MessageSubscriberSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSubscriberSender").finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageSubscriber for MessageSubscriberSender {
    #[tracing::instrument(skip_all, fields(subject = %arg.subject))]
    async fn handle_message(&self, ctx: &Context, arg: SubMessage) -> Result<(), RpcError> {
        let buf = encode_value(&arg)?;
        let msg = RpcMessage::new(
            format!("{MESSAGE_SUBSCRIBER_INTERFACE}.{HANDLE_MESSAGE_METHOD}"),
            buf,
        );
        self.transport.send(ctx, msg).await?;
        Ok(())
    }
}
