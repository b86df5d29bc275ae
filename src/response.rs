//! The caller-facing half of an intercepted request.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::registry::EntryId;

/// Future returned by [`crate::TestHttpClient::intercept`].
///
/// Resolves with whatever the test delivers through
/// [`crate::PendingRequest::succeed`] or [`crate::PendingRequest::fail`].
/// If the entry is evicted instead (`remove_one`, `remove_all`, `reset`) the
/// future never resolves. Tests that need a deadline should race it with
/// their own timer.
#[must_use = "futures do nothing unless polled; the request is already recorded"]
#[derive(Debug)]
pub struct PendingResponse<T, E> {
    id: EntryId,
    // `None` once the sender is gone. A closed receiver must not be polled again.
    receiver: Option<oneshot::Receiver<Result<T, E>>>,
}

impl<T, E> PendingResponse<T, E> {
    pub(crate) fn new(id: EntryId, receiver: oneshot::Receiver<Result<T, E>>) -> Self {
        Self {
            id,
            receiver: Some(receiver),
        }
    }

    /// Identity of the registry entry backing this future.
    pub fn id(&self) -> EntryId {
        self.id
    }
}

impl<T, E> Future for PendingResponse<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => {
                self.receiver = None;
                Poll::Ready(outcome)
            }
            // Evicted without settlement: stay pending for good.
            Poll::Ready(Err(_)) => {
                self.receiver = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
