use assert_matches::assert_matches;

use super::*;
use crate::codec::{CodecError, decode_from_slice, encode_to_bytes};
use crate::message::{PubMessage, ReplyMessage, RequestMessage, SubMessage};
use crate::messaging::{MESSAGING_METHODS, MessagingReceiver};
use crate::subscriber::MessageSubscriberReceiver;
use crate::test_utils::{EchoService, FAILING_SUBJECT, RecordingSubscriber};

fn publish_bytes() -> Bytes {
    encode_to_bytes(&PubMessage::new("orders.new", vec![0x01u8, 0x02])).unwrap()
}

#[tokio::test]
async fn test_publish_yields_empty_result() {
    let service = EchoService::new();
    let receiver = MessagingReceiver::from_arc(service.clone());

    let result = receiver
        .dispatch(&Context::new(), "Publish", &publish_bytes())
        .await
        .expect("publish failed");

    assert!(result.is_empty());
    assert_eq!(
        *service.published.lock(),
        vec![PubMessage::new("orders.new", vec![0x01u8, 0x02])]
    );
}

#[tokio::test]
async fn test_request_encodes_reply() {
    let service = EchoService::new();
    let receiver = MessagingReceiver::from_arc(service.clone());
    let arg = encode_to_bytes(&RequestMessage::new("math.reverse", vec![1u8, 2, 3], 100)).unwrap();

    let result = receiver
        .dispatch(&Context::new(), "Messaging.Request", &arg)
        .await
        .expect("request failed");

    let reply: ReplyMessage = decode_from_slice(&result).unwrap();
    assert_eq!(reply.subject, "math.reverse");
    assert_eq!(&reply.body[..], &[3, 2, 1]);
}

#[test_log::test(tokio::test)]
async fn test_unknown_method_is_reported_and_not_invoked() {
    let service = EchoService::new();
    let receiver = MessagingReceiver::from_arc(service.clone());

    let err = receiver
        .dispatch(&Context::new(), "Subscribe", &publish_bytes())
        .await
        .unwrap_err();

    assert_eq!(err, RpcError::MethodNotHandled("Messaging.Subscribe".into()));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_method_of_another_interface_is_not_matched() {
    let receiver = MessagingReceiver::new(EchoService::default());
    let err = receiver
        .dispatch(&Context::new(), "MessageSubscriber.Publish", &publish_bytes())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RpcError::MethodNotHandled("MessageSubscriber.Publish".into())
    );
}

#[tokio::test]
async fn test_decode_failure_halts_dispatch() {
    let service = EchoService::new();
    let receiver = MessagingReceiver::from_arc(service.clone());

    let err = receiver
        .dispatch(&Context::new(), "Publish", &[0xa5, b'x'])
        .await
        .unwrap_err();

    assert_matches!(err, RpcError::Deser(CodecError::TypeMismatch { expected: "map", .. }));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_handler_error_is_returned_unchanged() {
    let receiver = MessagingReceiver::new(EchoService::default());
    let arg = encode_to_bytes(&RequestMessage::new(FAILING_SUBJECT, Bytes::new(), 10)).unwrap();

    let err = receiver
        .dispatch(&Context::new(), "Request", &arg)
        .await
        .unwrap_err();

    assert_eq!(err, RpcError::Handler("no responders available".into()));
}

#[tokio::test]
async fn test_nil_argument_reaches_handler_as_default() {
    let service = EchoService::new();
    let receiver = MessagingReceiver::from_arc(service.clone());

    receiver
        .dispatch(&Context::new(), "Publish", &[0xc0])
        .await
        .unwrap();

    assert_eq!(*service.published.lock(), vec![PubMessage::default()]);
}

#[tokio::test]
async fn test_strict_receiver_rejects_unknown_fields() {
    let mut buf = Vec::new();
    rmp::encode::write_map_len(&mut buf, 2).unwrap();
    rmp::encode::write_str(&mut buf, "subject").unwrap();
    rmp::encode::write_str(&mut buf, "orders.new").unwrap();
    rmp::encode::write_str(&mut buf, "priority").unwrap();
    rmp::encode::write_u32(&mut buf, 1).unwrap();

    let lenient = MessagingReceiver::new(EchoService::default());
    assert!(lenient.dispatch(&Context::new(), "Publish", &buf).await.is_ok());

    let strict = lenient.clone().with_decode_options(DecodeOptions::strict());
    let err = strict
        .dispatch(&Context::new(), "Publish", &buf)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RpcError::Deser(CodecError::UnknownField("priority".into()))
    );
}

#[test]
fn test_method_table_lookup() {
    assert!(MESSAGING_METHODS.lookup("Publish").is_some());
    assert!(MESSAGING_METHODS.lookup("Messaging.Request").is_some());
    assert!(MESSAGING_METHODS.lookup("Messaging.").is_none());
    assert!(MESSAGING_METHODS.lookup("publish").is_none());
    assert_eq!(MESSAGING_METHODS.qualify("Publish"), "Messaging.Publish");
    assert_eq!(
        MESSAGING_METHODS.qualify("Other.Publish"),
        "Other.Publish"
    );
    assert_eq!(
        MESSAGING_METHODS.method_names().collect::<Vec<_>>(),
        ["Publish", "Request"]
    );
}

fn dispatcher(
    service: std::sync::Arc<EchoService>,
    subscriber: std::sync::Arc<RecordingSubscriber>,
) -> Dispatcher {
    Dispatcher::builder()
        .register(MessagingReceiver::from_arc(service))
        .register(MessageSubscriberReceiver::from_arc(subscriber))
        .build()
        .expect("failed to build dispatcher")
}

#[tokio::test]
async fn test_dispatcher_routes_by_interface() {
    let service = EchoService::new();
    let subscriber = RecordingSubscriber::new();
    let dispatcher = dispatcher(service.clone(), subscriber.clone());

    let mut interfaces: Vec<_> = dispatcher.interfaces().collect();
    interfaces.sort();
    assert_eq!(interfaces, ["MessageSubscriber", "Messaging"]);

    let ctx = Context::new();
    dispatcher
        .dispatch(&ctx, &RpcMessage::new("Messaging.Publish", publish_bytes()))
        .await
        .unwrap();

    let sub = SubMessage {
        subject: "orders.new".into(),
        reply_to: String::new(),
        body: Bytes::from_static(b"hi"),
    };
    let out = dispatcher
        .dispatch(
            &ctx,
            &RpcMessage::new("MessageSubscriber.HandleMessage", encode_to_bytes(&sub).unwrap()),
        )
        .await
        .unwrap();

    assert!(out.is_empty());
    assert_eq!(service.published.lock().len(), 1);
    assert_eq!(*subscriber.received.lock(), vec![sub]);
}

#[tokio::test]
async fn test_dispatcher_rejects_unknown_interface() {
    let service = EchoService::new();
    let dispatcher = dispatcher(service.clone(), RecordingSubscriber::new());

    let err = dispatcher
        .dispatch(&Context::new(), &RpcMessage::new("Blobstore.Publish", publish_bytes()))
        .await
        .unwrap_err();
    assert_eq!(err, RpcError::MethodNotHandled("Blobstore.Publish".into()));

    let err = dispatcher
        .dispatch(&Context::new(), &RpcMessage::new("Publish", publish_bytes()))
        .await
        .unwrap_err();
    assert_eq!(err, RpcError::MethodNotHandled("Publish".into()));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_dispatcher_reports_unknown_method_with_interface() {
    let dispatcher = dispatcher(EchoService::new(), RecordingSubscriber::new());
    let err = dispatcher
        .dispatch(&Context::new(), &RpcMessage::new("Messaging.Unsubscribe", Bytes::new()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RpcError::MethodNotHandled("Messaging.Unsubscribe".into())
    );
}

#[test]
fn test_duplicate_interface_is_rejected() {
    let result = Dispatcher::builder()
        .register(MessagingReceiver::new(EchoService::default()))
        .register(MessagingReceiver::new(EchoService::default()))
        .build();
    assert_matches!(result, Err(DispatcherError::DuplicateInterface(name)) if name == "Messaging");
}

#[test]
fn test_receiver_metadata() {
    let receiver = MessagingReceiver::new(EchoService::default());
    assert_eq!(receiver.interface(), "Messaging");
    assert_eq!(receiver.contract_id(), "wasmcloud:messaging");
    assert_eq!(receiver.methods(), ["Publish", "Request"]);

    let dispatcher = Dispatcher::builder().register(receiver).build().unwrap();
    let found = dispatcher.receiver("Messaging").expect("receiver missing");
    assert_eq!(found.methods(), ["Publish", "Request"]);
    assert!(dispatcher.receiver("MessageSubscriber").is_none());
}
