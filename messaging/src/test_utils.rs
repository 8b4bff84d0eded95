//! Services and transports shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::context::Context;
use crate::error::RpcError;
use crate::message::{PubMessage, ReplyMessage, RequestMessage, SubMessage};
use crate::messaging::Messaging;
use crate::subscriber::MessageSubscriber;
use crate::transport::{RpcMessage, Transport};

/// Subject that makes [`EchoService`] fail a request.
pub const FAILING_SUBJECT: &str = "no.responders";

/// A [`Messaging`] service that records publishes and echoes requests back
/// with the body reversed.
#[derive(Default)]
pub struct EchoService {
    pub published: Mutex<Vec<PubMessage>>,
    pub requests: Mutex<Vec<RequestMessage>>,
    calls: AtomicUsize,
}

impl EchoService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messaging for EchoService {
    async fn publish(&self, _ctx: &Context, arg: PubMessage) -> Result<(), RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.published.lock().push(arg);
        Ok(())
    }

    async fn request(&self, _ctx: &Context, arg: RequestMessage) -> Result<ReplyMessage, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(arg.clone());
        if arg.subject == FAILING_SUBJECT {
            return Err(RpcError::handler("no responders available"));
        }
        let mut body = arg.body.to_vec();
        body.reverse();
        Ok(ReplyMessage {
            subject: arg.subject,
            reply_to: String::new(),
            body: Bytes::from(body),
        })
    }
}

/// A [`MessageSubscriber`] that records what it receives.
#[derive(Default)]
pub struct RecordingSubscriber {
    pub received: Mutex<Vec<SubMessage>>,
    pub callers: Mutex<Vec<Option<String>>>,
}

impl RecordingSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl MessageSubscriber for RecordingSubscriber {
    async fn handle_message(&self, ctx: &Context, arg: SubMessage) -> Result<(), RpcError> {
        self.callers.lock().push(ctx.caller().map(str::to_owned));
        if arg.subject.is_empty() {
            return Err(RpcError::handler("empty subject"));
        }
        self.received.lock().push(arg);
        Ok(())
    }
}

/// A transport that records every call and answers with a canned result.
#[derive(Clone)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<RpcMessage>>>,
    response: Result<Bytes, RpcError>,
}

impl RecordingTransport {
    pub fn replying(response: impl Into<Bytes>) -> Self {
        Self {
            sent: Arc::default(),
            response: Ok(response.into()),
        }
    }

    pub fn failing(error: RpcError) -> Self {
        Self {
            sent: Arc::default(),
            response: Err(error),
        }
    }

    pub fn sent(&self) -> Vec<RpcMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, _ctx: &Context, msg: RpcMessage) -> Result<Bytes, RpcError> {
        self.sent.lock().push(msg);
        self.response.clone()
    }
}
