use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::Notify;

use super::*;
use crate::codec::encode_to_bytes;
use crate::message::{PubMessage, ReplyMessage, RequestMessage};
use crate::messaging::{Messaging, MessagingReceiver};
use crate::test_utils::EchoService;

#[test]
fn test_split_method() {
    let msg = RpcMessage::new("Messaging.Publish", Bytes::new());
    assert_eq!(msg.split_method(), (Some("Messaging"), "Publish"));

    let msg = RpcMessage::new("Publish", Bytes::new());
    assert_eq!(msg.split_method(), (None, "Publish"));
}

#[test]
fn test_target_display() {
    let provider = Target::provider("wasmcloud:messaging", DEFAULT_LINK_NAME);
    assert_eq!(provider.to_string(), "provider://wasmcloud:messaging/default");

    let actor = Target::actor("MBCFOPM6JW2APJLXJD3Z5O4CN7CPYJ2B4FTKLJUR5YR5MITIU7HD3WD5");
    assert_eq!(
        actor.to_string(),
        "actor://MBCFOPM6JW2APJLXJD3Z5O4CN7CPYJ2B4FTKLJUR5YR5MITIU7HD3WD5"
    );
}

#[test]
fn test_target_serde() {
    let target = Target::provider("wasmcloud:messaging", "backup");
    let json = serde_json::to_value(&target).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "kind": "provider",
            "contract_id": "wasmcloud:messaging",
            "link_name": "backup",
        })
    );

    let parsed: Target =
        serde_json::from_str(r#"{ "kind": "actor", "actor_id": "Mxyz" }"#).unwrap();
    assert_eq!(parsed, Target::actor("Mxyz"));
}

fn echo_dispatcher(service: Arc<EchoService>) -> Arc<Dispatcher> {
    let dispatcher = Dispatcher::builder()
        .register(MessagingReceiver::from_arc(service))
        .build()
        .expect("failed to build dispatcher");
    Arc::new(dispatcher)
}

fn publish_message() -> RpcMessage {
    let arg = encode_to_bytes(&PubMessage::new("orders.new", vec![1u8])).unwrap();
    RpcMessage::new("Messaging.Publish", arg)
}

#[tokio::test]
async fn test_loopback_delivers_to_dispatcher() {
    let service = EchoService::new();
    let transport = LoopbackTransport::new(echo_dispatcher(service.clone()));

    let out = transport
        .send(&Context::new(), publish_message())
        .await
        .unwrap();

    assert!(out.is_empty());
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn test_unreachable_target() {
    let transport =
        LoopbackTransport::unreachable(Target::provider("wasmcloud:messaging", "default"));

    let err = transport
        .send(&Context::new(), publish_message())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RpcError::Transport(TransportError::Unreachable(
            "provider://wasmcloud:messaging/default".into()
        ))
    );
}

#[tokio::test]
async fn test_cancelled_context_is_not_delivered() {
    let service = EchoService::new();
    let transport = LoopbackTransport::new(echo_dispatcher(service.clone()));

    let ctx = Context::new();
    ctx.cancellation().cancel();

    let err = transport.send(&ctx, publish_message()).await.unwrap_err();
    assert_eq!(err, RpcError::Transport(TransportError::Cancelled));
    assert_eq!(service.calls(), 0);
}

/// A messaging service whose requests never finish on their own.
struct StalledService {
    entered: Arc<Notify>,
}

#[async_trait]
impl Messaging for StalledService {
    async fn publish(&self, _ctx: &Context, _arg: PubMessage) -> Result<(), RpcError> {
        Ok(())
    }

    async fn request(&self, _ctx: &Context, _arg: RequestMessage) -> Result<ReplyMessage, RpcError> {
        self.entered.notify_one();
        futures::future::pending().await
    }
}

#[tokio::test]
async fn test_cancellation_interrupts_pending_call() {
    let entered = Arc::new(Notify::new());
    let dispatcher = Dispatcher::builder()
        .register(MessagingReceiver::new(StalledService {
            entered: entered.clone(),
        }))
        .build()
        .unwrap();
    let transport = LoopbackTransport::new(Arc::new(dispatcher));

    let ctx = Context::new();
    let arg = encode_to_bytes(&RequestMessage::new("slow", Bytes::new(), 50)).unwrap();
    let call = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            transport
                .send(&ctx, RpcMessage::new("Messaging.Request", arg))
                .await
        })
    };

    entered.notified().await;
    ctx.cancellation().cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .expect("call did not observe cancellation")
        .expect("task panicked");
    assert_matches!(result, Err(RpcError::Transport(TransportError::Cancelled)));
}

#[tokio::test]
async fn test_connector_routes_by_target() {
    let service = EchoService::new();
    let target = Target::provider("wasmcloud:messaging", "default");
    let connector = LoopbackConnector::new().route(target.clone(), echo_dispatcher(service.clone()));

    let routed = connector.connect(&target);
    routed.send(&Context::new(), publish_message()).await.unwrap();
    assert_eq!(service.calls(), 1);

    let other = connector.connect(&Target::provider("wasmcloud:messaging", "backup"));
    let err = other
        .send(&Context::new(), publish_message())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RpcError::Transport(TransportError::Unreachable(
            "provider://wasmcloud:messaging/backup".into()
        ))
    );
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn test_boxed_transport_clones() {
    let service = EchoService::new();
    let boxed: Box<dyn Transport> = Box::new(LoopbackTransport::new(echo_dispatcher(service.clone())));
    let cloned = boxed.clone();

    boxed.send(&Context::new(), publish_message()).await.unwrap();
    cloned.send(&Context::new(), publish_message()).await.unwrap();
    assert_eq!(service.calls(), 2);
}
