//! User-facing dispatch contracts.

use futures_util::future::BoxFuture;

use crate::client::Client;
use crate::message::Message;

/// Receives every incoming message, after the client's internal filters and
/// trackers have seen it.
///
/// Handlers are invoked sequentially on the read task, in arrival order, and
/// are not gated on registration: pre-001 notices are dispatched too. A
/// handler that wants to keep a message past its invocation must clone it.
pub trait Handler: Send + Sync {
    /// Handle one message.
    fn handle<'a>(&'a self, client: &'a Client, msg: &'a Message) -> BoxFuture<'a, ()>;
}

/// Adapter that lets a function act as a [`Handler`].
///
/// ```
/// use futures_util::future::BoxFuture;
/// use slirc_client::{Client, HandlerFn, Message};
///
/// fn log_message<'a>(_client: &'a Client, msg: &'a Message) -> BoxFuture<'a, ()> {
///     let command = msg.command.clone();
///     Box::pin(async move {
///         println!("<- {}", command);
///     })
/// }
///
/// let handler = HandlerFn::new(log_message);
/// ```
pub struct HandlerFn<F>(F);

impl<F> HandlerFn<F>
where
    F: for<'a> Fn(&'a Client, &'a Message) -> BoxFuture<'a, ()> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        HandlerFn(f)
    }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a Client, &'a Message) -> BoxFuture<'a, ()> + Send + Sync,
{
    fn handle<'a>(&'a self, client: &'a Client, msg: &'a Message) -> BoxFuture<'a, ()> {
        (self.0)(client, msg)
    }
}

/// Filter consulted for outbound messages sent through
/// [`Client::write_message`](crate::Client::write_message).
///
/// Returning `true` drops the message. Raw line writes bypass the filter;
/// when a rate limiter is also configured, the filter runs first.
pub trait OutboundFilter: Send + Sync {
    /// Decide whether to drop the outgoing message.
    fn filter(&self, client: &Client, msg: &Message) -> bool;
}

/// Adapter that lets a closure act as an [`OutboundFilter`].
pub struct FilterFn<F>(F);

impl<F> FilterFn<F>
where
    F: Fn(&Client, &Message) -> bool + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        FilterFn(f)
    }
}

impl<F> OutboundFilter for FilterFn<F>
where
    F: Fn(&Client, &Message) -> bool + Send + Sync,
{
    fn filter(&self, client: &Client, msg: &Message) -> bool {
        (self.0)(client, msg)
    }
}
