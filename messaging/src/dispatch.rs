//! Server side method dispatch.
//!
//! Every interface has a static [`MethodTable`] mapping method names to plain
//! function pointers. A [`ServiceReceiver`] binds a table to the service
//! implementation registered by the host, and the [`Dispatcher`] routes
//! `Interface.Method` calls to the right receiver.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;

use crate::codec::{self, Decode, DecodeOptions, Encode};
use crate::context::Context;
use crate::error::RpcError;
use crate::transport::RpcMessage;

#[cfg(test)]
#[path = "dispatch.test.rs"]
mod tests;

/// Future returned by a table handler.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<Bytes, RpcError>>;

/// Decodes the argument, calls the service and encodes the result.
pub type HandlerFn<S> =
    for<'a> fn(&'a S, &'a Context, &'a [u8], DecodeOptions) -> HandlerFuture<'a>;

/// A single entry of a [`MethodTable`].
pub struct Method<S: ?Sized + 'static> {
    pub name: &'static str,
    pub handler: HandlerFn<S>,
}

/// The static method table of one interface.
pub struct MethodTable<S: ?Sized + 'static> {
    pub interface: &'static str,
    pub contract_id: &'static str,
    pub methods: &'static [Method<S>],
}

impl<S: ?Sized + 'static> MethodTable<S> {
    /// Finds a method by bare or `Interface.`-qualified name.
    pub fn lookup(&self, method: &str) -> Option<&Method<S>> {
        let name = method
            .strip_prefix(self.interface)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(method);
        self.methods.iter().find(|m| m.name == name)
    }

    /// The `Interface.Method` form of `method`.
    pub fn qualify(&self, method: &str) -> String {
        if method.contains('.') {
            method.to_string()
        } else {
            format!("{}.{}", self.interface, method)
        }
    }

    pub fn method_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.iter().map(|m| m.name)
    }
}

/// Decodes a handler argument, reporting failures as [`RpcError::Deser`].
pub fn decode_arg<T: Decode>(arg: &[u8], options: DecodeOptions) -> Result<T, RpcError> {
    codec::decode_from_slice_with(arg, options).map_err(|e| {
        tracing::debug!(error = %e, "failed to decode argument");
        RpcError::Deser(e)
    })
}

/// Encodes a value into an exactly sized buffer, reporting failures as
/// [`RpcError::Ser`].
pub fn encode_value<T: Encode>(value: &T) -> Result<Bytes, RpcError> {
    codec::encode_to_bytes(value).map_err(RpcError::Ser)
}

/// Receives calls for a single interface.
#[async_trait]
pub trait Receiver: Send + Sync {
    fn interface(&self) -> &'static str;

    fn contract_id(&self) -> &'static str;

    fn methods(&self) -> Vec<&'static str>;

    /// Routes one call. `method` may be bare (`Publish`) or qualified
    /// (`Messaging.Publish`).
    async fn dispatch(&self, ctx: &Context, method: &str, arg: &[u8]) -> Result<Bytes, RpcError>;
}

/// Binds a service implementation to its interface's method table.
pub struct ServiceReceiver<S: ?Sized + 'static> {
    table: &'static MethodTable<S>,
    service: Arc<S>,
    options: DecodeOptions,
}

impl<S: ?Sized + 'static> ServiceReceiver<S> {
    pub fn from_parts(table: &'static MethodTable<S>, service: Arc<S>) -> Self {
        Self {
            table,
            service,
            options: DecodeOptions::default(),
        }
    }

    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn table(&self) -> &'static MethodTable<S> {
        self.table
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }
}

impl<S: ?Sized + 'static> Clone for ServiceReceiver<S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            service: self.service.clone(),
            options: self.options,
        }
    }
}

impl<S: ?Sized + 'static> fmt::Debug for ServiceReceiver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReceiver")
            .field("interface", &self.table.interface)
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl<S> Receiver for ServiceReceiver<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    fn interface(&self) -> &'static str {
        self.table.interface
    }

    fn contract_id(&self) -> &'static str {
        self.table.contract_id
    }

    fn methods(&self) -> Vec<&'static str> {
        self.table.method_names().collect()
    }

    #[tracing::instrument(
        name = "dispatch",
        skip_all,
        fields(interface = self.table.interface, method = method, call_id = %ctx.call_id())
    )]
    async fn dispatch(&self, ctx: &Context, method: &str, arg: &[u8]) -> Result<Bytes, RpcError> {
        let Some(entry) = self.table.lookup(method) else {
            let qualified = self.table.qualify(method);
            tracing::warn!(method = %qualified, "method not handled");
            return Err(RpcError::MethodNotHandled(qualified));
        };

        let result = (entry.handler)(&*self.service, ctx, arg, self.options).await;
        match &result {
            Ok(buf) => tracing::trace!(len = buf.len(), "dispatched"),
            Err(e) => tracing::debug!(error = %e, "call failed"),
        }
        result
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatcherError {
    #[error("Interface registered twice: {0}")]
    DuplicateInterface(String),
}

/// Routes `Interface.Method` calls to registered receivers.
///
/// Built once at startup; the set of receivers does not change afterwards.
pub struct Dispatcher {
    receivers: HashMap<&'static str, Box<dyn Receiver>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.receivers.keys().copied()
    }

    pub fn receiver(&self, interface: &str) -> Option<&dyn Receiver> {
        self.receivers.get(interface).map(|r| r.as_ref())
    }

    /// Routes a call by its qualified method name.
    ///
    /// A name without an interface prefix, or with an interface nobody
    /// registered, fails with [`RpcError::MethodNotHandled`] carrying the name
    /// as received.
    pub async fn dispatch(&self, ctx: &Context, msg: &RpcMessage) -> Result<Bytes, RpcError> {
        let receiver = match msg.split_method() {
            (Some(interface), _) => self.receivers.get(interface),
            (None, _) => None,
        };

        match receiver {
            Some(receiver) => receiver.dispatch(ctx, &msg.method, &msg.arg).await,
            None => {
                tracing::warn!(method = %msg.method, "no receiver for method");
                Err(RpcError::MethodNotHandled(msg.method.clone()))
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("interfaces", &self.receivers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Default)]
pub struct DispatcherBuilder {
    receivers: Vec<Box<dyn Receiver>>,
}

impl DispatcherBuilder {
    pub fn register(mut self, receiver: impl Receiver + 'static) -> Self {
        self.receivers.push(Box::new(receiver));
        self
    }

    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut receivers = HashMap::with_capacity(self.receivers.len());
        for receiver in self.receivers {
            let interface = receiver.interface();
            if receivers.insert(interface, receiver).is_some() {
                return Err(DispatcherError::DuplicateInterface(interface.to_string()));
            }
            tracing::debug!(interface, "registered receiver");
        }
        Ok(Dispatcher { receivers })
    }
}
