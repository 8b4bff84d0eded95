use std::fmt::Display;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for a single call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ambient context handed to every send and every handler invocation.
///
/// The dispatcher and senders only carry the context through; identity and
/// cancellation are interpreted by transports and service implementations.
#[derive(Debug, Clone, Default)]
pub struct Context {
    call_id: CallId,
    caller: Option<Arc<str>>,
    cancellation: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the identity of the calling actor.
    pub fn with_caller(mut self, caller: impl Into<Arc<str>>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// A context for a nested call: same caller, fresh call id, and a
    /// cancellation token that is cancelled along with this one.
    pub fn child(&self) -> Self {
        Self {
            call_id: CallId::new(),
            caller: self.caller.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_context_inherits_caller_and_cancellation() {
        let parent = Context::new().with_caller("MBCFOPM6JW2APJLXJD3Z5O4CN7CPYJ2B4FTKLJUR5YR5MITIU7HD3WD5");
        let child = parent.child();

        assert_eq!(child.caller(), parent.caller());
        assert_ne!(child.call_id(), parent.call_id());
        assert!(!child.is_cancelled());

        parent.cancellation().cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_cancelling_child_leaves_parent_running() {
        let parent = Context::new();
        let child = parent.child();
        child.cancellation().cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
