use std::sync::Arc;

use super::*;
use crate::dispatch::{Dispatcher, Receiver};
use crate::test_utils::{RecordingSubscriber, RecordingTransport};
use crate::transport::{LoopbackConnector, TransportError};

const ACTOR_ID: &str = "MBCFOPM6JW2APJLXJD3Z5O4CN7CPYJ2B4FTKLJUR5YR5MITIU7HD3WD5";

fn connector(subscriber: Arc<RecordingSubscriber>) -> LoopbackConnector {
    let dispatcher = Dispatcher::builder()
        .register(MessageSubscriberReceiver::from_arc(subscriber))
        .build()
        .expect("failed to build dispatcher");
    LoopbackConnector::new().route(Target::actor(ACTOR_ID), Arc::new(dispatcher))
}

fn sub_message(subject: &str) -> SubMessage {
    SubMessage {
        subject: subject.into(),
        reply_to: "_INBOX.1".into(),
        body: Bytes::from_static(b"hello"),
    }
}

#[test_log::test(tokio::test)]
async fn test_handle_message_end_to_end() {
    let subscriber = RecordingSubscriber::new();
    let sender = MessageSubscriberSender::for_actor(&connector(subscriber.clone()), ACTOR_ID);

    let ctx = Context::new().with_caller("VAHNM37G4ZEQ6TVSDYPZCRWMZ6JMKNUQJB2LUH7ZXNBSYY4WLJKQ6KV");
    sender
        .handle_message(&ctx, sub_message("orders.new"))
        .await
        .unwrap();

    assert_eq!(*subscriber.received.lock(), vec![sub_message("orders.new")]);
    assert_eq!(
        *subscriber.callers.lock(),
        vec![Some(
            "VAHNM37G4ZEQ6TVSDYPZCRWMZ6JMKNUQJB2LUH7ZXNBSYY4WLJKQ6KV".to_string()
        )]
    );
}

#[tokio::test]
async fn test_handler_error_is_propagated() {
    let subscriber = RecordingSubscriber::new();
    let sender = MessageSubscriberSender::for_actor(&connector(subscriber.clone()), ACTOR_ID);

    let err = sender
        .handle_message(&Context::new(), sub_message(""))
        .await
        .unwrap_err();

    assert_eq!(err, RpcError::Handler("empty subject".into()));
    assert!(subscriber.received.lock().is_empty());
}

#[tokio::test]
async fn test_unknown_actor_is_unreachable() {
    let sender = MessageSubscriberSender::for_actor(&connector(RecordingSubscriber::new()), "Mnobody");

    let err = sender
        .handle_message(&Context::new(), sub_message("orders.new"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RpcError::Transport(TransportError::Unreachable("actor://Mnobody".into()))
    );
}

#[tokio::test]
async fn test_sender_wire_method() {
    let transport = RecordingTransport::replying(Bytes::new());
    let sender = MessageSubscriberSender::new(transport.clone());

    sender
        .handle_message(&Context::new(), sub_message("orders.new"))
        .await
        .unwrap();

    assert_eq!(transport.sent()[0].method, "MessageSubscriber.HandleMessage");
}

#[tokio::test]
async fn test_receiver_answers_with_empty_buffer() {
    let receiver = MessageSubscriberReceiver::new(RecordingSubscriber::default());
    assert_eq!(receiver.interface(), MESSAGE_SUBSCRIBER_INTERFACE);
    assert_eq!(receiver.contract_id(), MESSAGING_CONTRACT_ID);

    let arg = encode_value(&sub_message("orders.new")).unwrap();
    let out = receiver
        .dispatch(&Context::new(), "HandleMessage", &arg)
        .await
        .unwrap();
    assert!(out.is_empty());

    let err = receiver
        .dispatch(&Context::new(), "Publish", &arg)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RpcError::MethodNotHandled("MessageSubscriber.Publish".into())
    );
}
