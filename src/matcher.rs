//! Pure matching of request descriptors against queries.

use crate::query::Query;
use crate::request::RequestDescriptor;

/// Whether `request` satisfies `query`.
///
/// URL comparison is exact and case-sensitive. Method comparison, only used
/// by descriptor queries, ignores ASCII case. Predicate panics propagate.
pub fn matches<R: RequestDescriptor>(request: &R, query: &Query<R>) -> bool {
    match query {
        Query::Url(url) => request.url() == url,
        Query::Request { url, method } => {
            request.url() == url && request.method().eq_ignore_ascii_case(method)
        }
        Query::Predicate(predicate) => predicate.test(request),
    }
}
