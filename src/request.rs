//! Request descriptors recorded by the registry.
//!
//! The registry never builds requests itself. It only reads the URL and the
//! method through [`RequestDescriptor`], so any request type produced by the
//! application can be intercepted.

use std::fmt;

/// Read-only view of an outbound request used for matching and diagnostics.
pub trait RequestDescriptor {
    /// The request URL exactly as the application produced it.
    fn url(&self) -> &str;

    /// The HTTP method. Compared case-insensitively.
    fn method(&self) -> &str;
}

/// Render a descriptor the same way a descriptor query is rendered.
pub fn describe_request<D: RequestDescriptor + ?Sized>(request: &D) -> String {
    format!(
        "method: {}, URL: {}",
        request.method().to_ascii_uppercase(),
        request.url()
    )
}

/// Owned request value used by tests and by applications that do not bring
/// their own request type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl Request {
    /// A `GET` request for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_method("GET", url)
    }

    pub fn with_method(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::with_method("POST", url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::with_method("PUT", url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::with_method("DELETE", url)
    }

    /// Append a header. Headers are kept in insertion order and never
    /// participate in matching.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value whose name matches `name`, ignoring ASCII case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

impl RequestDescriptor for Request {
    fn url(&self) -> &str {
        &self.url
    }

    fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe_request(self))
    }
}

#[cfg(feature = "reqwest")]
impl RequestDescriptor for reqwest::Request {
    fn url(&self) -> &str {
        reqwest::Request::url(self).as_str()
    }

    fn method(&self) -> &str {
        reqwest::Request::method(self).as_str()
    }
}
