use thiserror::Error;

/// Failures raised by registry queries and verification.
///
/// Every message starts with the registry name and embeds the query
/// description, so test output identifies which expectation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{client}: no pending request found for {query}")]
    NotFound { client: String, query: String },

    #[error("{client}: expected one pending request for {query}, found {count}")]
    AmbiguousMatch {
        client: String,
        query: String,
        count: usize,
    },

    #[error("{client}: no pending requests found for {query}")]
    NoneFound { client: String, query: String },

    #[error(
        "{client}: {count} unverified pending request(s): {listing}",
        count = .pending.len(),
        listing = .pending.join("; ")
    )]
    UnverifiedRequests { client: String, pending: Vec<String> },
}

impl RegistryError {
    /// Description of the query that failed, or `None` for verification
    /// failures which are not tied to a query.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::NotFound { query, .. }
            | Self::AmbiguousMatch { query, .. }
            | Self::NoneFound { query, .. } => Some(query.as_str()),
            Self::UnverifiedRequests { .. } => None,
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
