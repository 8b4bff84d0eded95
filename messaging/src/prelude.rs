//! Commonly used messaging types and traits.
//!
//! Import this module to implement or call the messaging interfaces.

pub use async_trait::async_trait;
pub use bytes::Bytes;

pub use super::codec::{CodecError, Decode, DecodeOptions, Encode};
pub use super::config::Config;
pub use super::context::Context;
pub use super::dispatch::{Dispatcher, Receiver};
pub use super::error::RpcError;
pub use super::message::{PubMessage, ReplyMessage, RequestMessage, SubMessage};
pub use super::messaging::{Messaging, MessagingReceiver, MessagingSender};
pub use super::subscriber::{MessageSubscriber, MessageSubscriberReceiver, MessageSubscriberSender};
pub use super::transport::{Connector, RpcMessage, Target, Transport, TransportError};
