//! Records exchanged with the messaging capability.

use std::time::Duration;

use bytes::Bytes;

#[cfg(test)]
#[path = "message.test.rs"]
mod tests;

record! {
    /// A message to be published
    pub struct PubMessage {
        /// The subject, or topic, of the message
        subject: String => "subject",
        /// An optional topic on which the reply should be sent.
        reply_to: String => "replyTo",
        /// The message payload
        body: Bytes => "body",
    }
}

record! {
    /// Reply received from a Request operation
    pub struct ReplyMessage {
        /// The subject, or topic, of the message
        subject: String => "subject",
        /// An optional topic on which the reply should be sent.
        reply_to: String => "replyTo",
        /// The message payload
        body: Bytes => "body",
    }
}

record! {
    /// Message sent as part of a request, with timeout
    pub struct RequestMessage {
        /// The subject, or topic, of the message
        subject: String => "subject",
        /// The message payload
        body: Bytes => "body",
        /// A timeout, in milliseconds
        timeout_ms: u32 => "timeoutMs",
    }
}

record! {
    /// Message received as part of a subscription
    pub struct SubMessage {
        /// The subject, or topic, of the message
        subject: String => "subject",
        /// An optional topic on which the reply should be sent.
        reply_to: String => "replyTo",
        /// The message payload
        body: Bytes => "body",
    }
}

impl PubMessage {
    pub fn new(subject: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            reply_to: String::new(),
            body: body.into(),
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = reply_to.into();
        self
    }
}

impl RequestMessage {
    pub fn new(subject: impl Into<String>, body: impl Into<Bytes>, timeout_ms: u32) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            timeout_ms,
        }
    }

    /// The requested timeout. Carried to the provider as-is, never enforced here.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.into())
    }
}

impl SubMessage {
    /// Whether the publisher asked for a reply.
    pub fn expects_reply(&self) -> bool {
        !self.reply_to.is_empty()
    }
}

impl From<SubMessage> for PubMessage {
    fn from(msg: SubMessage) -> Self {
        Self {
            subject: msg.subject,
            reply_to: msg.reply_to,
            body: msg.body,
        }
    }
}

impl From<PubMessage> for SubMessage {
    fn from(msg: PubMessage) -> Self {
        Self {
            subject: msg.subject,
            reply_to: msg.reply_to,
            body: msg.body,
        }
    }
}
