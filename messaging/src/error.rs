use crate::codec::CodecError;
use crate::transport::TransportError;

/// Errors surfaced by dispatchers, senders and service handlers.
///
/// Handler errors are returned to the caller exactly as the handler produced
/// them; the dispatcher and senders never wrap, translate or retry.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// The argument or reply bytes could not be decoded.
    #[error("Deserialization error: {0}")]
    Deser(#[source] CodecError),

    /// A value could not be encoded.
    #[error("Serialization error: {0}")]
    Ser(#[source] CodecError),

    /// No handler is registered for the fully qualified method name.
    #[error("Method not handled: {0}")]
    MethodNotHandled(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A business error returned by a service implementation.
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("{0}")]
    Other(String),
}

impl RpcError {
    pub fn handler(msg: impl Into<String>) -> Self {
        RpcError::Handler(msg.into())
    }

    /// Short machine readable kind, matching the host runtime's error kinds.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::Deser(_) => "Deser",
            RpcError::Ser(_) => "Ser",
            RpcError::MethodNotHandled(_) => "MethodNotHandled",
            RpcError::Transport(_) => "Transport",
            RpcError::Handler(_) => "HandlerError",
            RpcError::Other(_) => "Other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_and_display() {
        let err = RpcError::MethodNotHandled("Messaging.Subscribe".to_string());
        assert_eq!(err.kind(), "MethodNotHandled");
        assert_eq!(err.to_string(), "Method not handled: Messaging.Subscribe");

        let err = RpcError::Deser(CodecError::InvalidUtf8);
        assert_eq!(err.kind(), "Deser");
        assert!(err.to_string().contains("UTF-8"));

        let err: RpcError = TransportError::Cancelled.into();
        assert_eq!(err.kind(), "Transport");
    }
}
