use std::sync::Arc;

use assert_matches::assert_matches;

use super::*;
use crate::codec::{CodecError, decode_from_slice};
use crate::dispatch::Dispatcher;
use crate::test_utils::{EchoService, FAILING_SUBJECT, RecordingTransport};
use crate::transport::{LoopbackConnector, LoopbackTransport, TransportError};

fn loopback_sender(service: Arc<EchoService>) -> MessagingSender {
    let dispatcher = Dispatcher::builder()
        .register(MessagingReceiver::from_arc(service))
        .build()
        .expect("failed to build dispatcher");
    MessagingSender::new(LoopbackTransport::new(Arc::new(dispatcher)))
}

#[test_log::test(tokio::test)]
async fn test_publish_end_to_end() {
    let service = EchoService::new();
    let sender = loopback_sender(service.clone());

    let msg = PubMessage::new("orders.new", vec![0x01u8, 0x02]).with_reply_to("orders.ack");
    sender.publish(&Context::new(), msg.clone()).await.unwrap();

    assert_eq!(*service.published.lock(), vec![msg]);
}

#[test_log::test(tokio::test)]
async fn test_request_end_to_end() {
    let service = EchoService::new();
    let sender = loopback_sender(service.clone());

    let reply = sender
        .request(
            &Context::new(),
            RequestMessage::new("math.reverse", vec![1u8, 2, 3], 1_000),
        )
        .await
        .unwrap();

    assert_eq!(reply.subject, "math.reverse");
    assert_eq!(&reply.body[..], &[3, 2, 1]);
    assert_eq!(service.requests.lock()[0].timeout_ms, 1_000);
}

#[tokio::test]
async fn test_handler_error_reaches_caller() {
    let sender = loopback_sender(EchoService::new());

    let err = sender
        .request(
            &Context::new(),
            RequestMessage::new(FAILING_SUBJECT, Bytes::new(), 10),
        )
        .await
        .unwrap_err();

    assert_eq!(err, RpcError::Handler("no responders available".into()));
}

#[tokio::test]
async fn test_sender_uses_qualified_method_names() {
    let transport = RecordingTransport::replying(Bytes::new());
    let sender = MessagingSender::new(transport.clone());

    let msg = PubMessage::new("orders.new", vec![0x01u8, 0x02]);
    sender.publish(&Context::new(), msg.clone()).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, "Messaging.Publish");
    assert_eq!(decode_from_slice::<PubMessage>(&sent[0].arg).unwrap(), msg);
}

#[tokio::test]
async fn test_publish_ignores_reply_payload() {
    let transport = RecordingTransport::replying(vec![0xc1u8, 0xc1]);
    let sender = MessagingSender::new(transport);

    tokio_test::assert_ok!(
        sender
            .publish(&Context::new(), PubMessage::new("orders.new", Bytes::new()))
            .await
    );
}

#[tokio::test]
async fn test_request_reply_that_does_not_decode() {
    let transport = RecordingTransport::replying(vec![0xa3u8, b'b', b'a', b'd']);
    let sender = MessagingSender::new(transport.clone());

    let err = sender
        .request(&Context::new(), RequestMessage::new("a", Bytes::new(), 1))
        .await
        .unwrap_err();

    assert_matches!(err, RpcError::Deser(CodecError::TypeMismatch { expected: "map", .. }));
    assert_eq!(transport.sent()[0].method, "Messaging.Request");
}

#[tokio::test]
async fn test_transport_errors_pass_through() {
    let failure = RpcError::Transport(TransportError::Other("connection reset".into()));
    let sender = MessagingSender::new(RecordingTransport::failing(failure.clone()));

    let err = sender
        .publish(&Context::new(), PubMessage::default())
        .await
        .unwrap_err();
    assert_eq!(err, failure);

    let err = sender
        .request(&Context::new(), RequestMessage::default())
        .await
        .unwrap_err();
    assert_eq!(err, failure);
}

#[tokio::test]
async fn test_for_provider_link_routing() {
    let default_service = EchoService::new();
    let backup_service = EchoService::new();
    let dispatcher = |service: Arc<EchoService>| {
        Arc::new(
            Dispatcher::builder()
                .register(MessagingReceiver::from_arc(service))
                .build()
                .unwrap(),
        )
    };
    let connector = LoopbackConnector::new()
        .route(
            Target::provider(MESSAGING_CONTRACT_ID, DEFAULT_LINK_NAME),
            dispatcher(default_service.clone()),
        )
        .route(
            Target::provider(MESSAGING_CONTRACT_ID, "backup"),
            dispatcher(backup_service.clone()),
        );

    let ctx = Context::new();
    MessagingSender::for_provider(&connector)
        .publish(&ctx, PubMessage::new("a", Bytes::new()))
        .await
        .unwrap();
    MessagingSender::for_provider_link(&connector, "backup")
        .publish(&ctx, PubMessage::new("b", Bytes::new()))
        .await
        .unwrap();

    assert_eq!(default_service.published.lock()[0].subject, "a");
    assert_eq!(backup_service.published.lock()[0].subject, "b");

    let err = MessagingSender::for_provider_link(&connector, "east")
        .publish(&ctx, PubMessage::new("c", Bytes::new()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RpcError::Transport(TransportError::Unreachable(
            "provider://wasmcloud:messaging/east".into()
        ))
    );
}

#[tokio::test]
async fn test_from_config_applies_link_and_strictness() {
    crate::telemetry::init_tracing("messaging=debug").expect("invalid directive");

    let service = EchoService::new();
    let connector = LoopbackConnector::new().route(
        Target::provider(MESSAGING_CONTRACT_ID, "backup"),
        Arc::new(
            Dispatcher::builder()
                .register(MessagingReceiver::from_arc(service.clone()))
                .build()
                .unwrap(),
        ),
    );
    let config = Config::default()
        .with_link_name("backup")
        .with_deny_unknown_fields(true);

    let sender = MessagingSender::from_config(&connector, &config);
    let reply = sender
        .request(&Context::new(), RequestMessage::new("x", vec![7u8, 8], 5))
        .await
        .unwrap();
    assert_eq!(&reply.body[..], &[8, 7]);
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn test_strict_sender_rejects_reply_with_unknown_field() {
    let mut reply = Vec::new();
    rmp::encode::write_map_len(&mut reply, 2).unwrap();
    rmp::encode::write_str(&mut reply, "subject").unwrap();
    rmp::encode::write_str(&mut reply, "r").unwrap();
    rmp::encode::write_str(&mut reply, "headers").unwrap();
    rmp::encode::write_map_len(&mut reply, 0).unwrap();

    let lenient = MessagingSender::new(RecordingTransport::replying(reply.clone()));
    let decoded = lenient
        .request(&Context::new(), RequestMessage::default())
        .await
        .unwrap();
    assert_eq!(decoded.subject, "r");

    let strict = lenient.with_decode_options(DecodeOptions::strict());
    let err = strict
        .request(&Context::new(), RequestMessage::default())
        .await
        .unwrap_err();
    assert_eq!(err, RpcError::Deser(CodecError::UnknownField("headers".into())));
}

#[tokio::test]
async fn test_sender_is_a_messaging_service() {
    // A sender can itself be registered, forwarding calls to another hop.
    let service = EchoService::new();
    let forwarder = loopback_sender(service.clone());
    let front = loopback_sender_for(Arc::new(forwarder));

    front
        .publish(&Context::new(), PubMessage::new("relay", Bytes::new()))
        .await
        .unwrap();
    assert_eq!(service.published.lock()[0].subject, "relay");
}

fn loopback_sender_for(service: Arc<dyn Messaging>) -> MessagingSender {
    let dispatcher = Dispatcher::builder()
        .register(MessagingReceiver::from_arc(service))
        .build()
        .unwrap();
    MessagingSender::new(LoopbackTransport::new(Arc::new(dispatcher)))
}
