//! Test double for an HTTP client.
//!
//! Application code sends requests through a [`TestHttpClient`] (directly or
//! via the [`HttpClient`] trait). Each request is recorded as a pending entry
//! and the caller receives a future that stays unsettled until the test
//! decides its outcome:
//!
//! ```
//! use futures::FutureExt;
//! use testhttp::{Request, TestHttpClient};
//!
//! let client: TestHttpClient<u32> = TestHttpClient::make();
//! let response = client.intercept(Request::get("/x"));
//!
//! client.find_one("/x")?.succeed(42);
//! assert_eq!(response.now_or_never().map(Result::ok), Some(Some(42)));
//! assert!(client.find_one("/x").is_err());
//! client.verify_none_outstanding()?;
//! # Ok::<(), testhttp::RegistryError>(())
//! ```
//!
//! Entries are located by URL, by request descriptor (URL plus
//! case-insensitive method) or by predicate. Lookups that require a single
//! match fail when the query is ambiguous rather than picking the first entry.
//!
//! The registry performs no I/O and no timing. Every operation runs
//! synchronously; only the returned futures are asynchronous.

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod matcher;
pub mod query;
pub mod registry;
pub mod request;
pub mod response;

pub use client::HttpClient;
pub use config::RegistryConfig;
pub use diagnostics::PendingSnapshot;
pub use error::{RegistryError, RegistryResult};
pub use matcher::matches;
pub use query::{Predicate, Query};
pub use registry::{EntryId, PendingRequest, TestHttpClient};
pub use request::{Request, RequestDescriptor, describe_request};
pub use response::PendingResponse;

pub use testhttp_commons::{MemoryTelemetry, NoopTelemetry, TelemetrySink, TracingTelemetry};
