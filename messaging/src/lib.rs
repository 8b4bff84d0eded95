//! Bindings for the messaging capability: publish, request-reply and
//! subscriptions.
//!
//! Records travel as MessagePack maps (see [`codec`]). Senders encode a
//! record and hand it to an injected [`Transport`]; on the other side a
//! [`Dispatcher`] routes the call by method name to the service registered
//! for that interface.

#[macro_use]
mod macros;

pub mod codec;
mod config;
mod context;
mod dispatch;
mod error;
mod message;
mod messaging;
pub mod prelude;
mod subscriber;
pub mod telemetry;
#[cfg(test)]
mod test_utils;
mod transport;

pub use config::Config;
pub use context::{CallId, Context};
pub use dispatch::{
    Dispatcher, DispatcherBuilder, DispatcherError, HandlerFn, HandlerFuture, Method, MethodTable,
    Receiver, ServiceReceiver, decode_arg, encode_value,
};
pub use error::RpcError;
pub use message::{PubMessage, ReplyMessage, RequestMessage, SubMessage};
pub use messaging::{
    MESSAGING_CONTRACT_ID, MESSAGING_INTERFACE, MESSAGING_METHODS, Messaging, MessagingReceiver,
    MessagingSender, PUBLISH_METHOD, REQUEST_METHOD,
};
pub use subscriber::{
    HANDLE_MESSAGE_METHOD, MESSAGE_SUBSCRIBER_INTERFACE, MESSAGE_SUBSCRIBER_METHODS,
    MessageSubscriber, MessageSubscriberReceiver, MessageSubscriberSender,
};
pub use transport::{
    Connector, DEFAULT_LINK_NAME, LoopbackConnector, LoopbackTransport, RpcMessage, Target,
    Transport, TransportError,
};
