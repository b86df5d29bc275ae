//! Snapshots of pending requests for the diagnostic sink.

use serde::Serialize;

use crate::registry::EntryId;
use crate::request::{RequestDescriptor, describe_request};

/// Point-in-time view of one pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSnapshot {
    pub id: EntryId,
    pub method: String,
    pub url: String,
    pub description: String,
}

impl PendingSnapshot {
    pub(crate) fn capture<R: RequestDescriptor>(id: EntryId, request: &R) -> Self {
        Self {
            id,
            method: request.method().to_string(),
            url: request.url().to_string(),
            description: describe_request(request),
        }
    }
}
