//! Seam between application code and the transport it sends requests through.
//!
//! Application code written against [`HttpClient`] can be handed a
//! [`TestHttpClient`] in tests and a real transport elsewhere.

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::registry::TestHttpClient;
use crate::request::RequestDescriptor;

/// Minimal asynchronous request sender.
pub trait HttpClient<R>: Send + Sync {
    type Output;
    type Error;

    /// Submit `request`. Implementations must register the request before
    /// returning, not on first poll.
    fn send(&self, request: R) -> BoxFuture<'static, Result<Self::Output, Self::Error>>;
}

impl<T, E, R> HttpClient<R> for TestHttpClient<T, E, R>
where
    T: Send + 'static,
    E: Send + 'static,
    R: RequestDescriptor + Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    fn send(&self, request: R) -> BoxFuture<'static, Result<T, E>> {
        self.intercept(request).boxed()
    }
}
