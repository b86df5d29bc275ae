//! Queries used to locate pending requests.
//!
//! A query is one of three shapes: a bare URL, a request descriptor (URL plus
//! method), or a predicate over the descriptor. Each query renders a stable
//! description that is embedded in registry error messages, so test output
//! reads the same way regardless of how the query was built.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::request::{Request, RequestDescriptor};

const ANONYMOUS: &str = "<anonymous>";

type PredicateFn<R> = dyn Fn(&R) -> bool + Send + Sync;

/// Boolean test over a request descriptor, optionally carrying a name for
/// diagnostics.
pub struct Predicate<R> {
    name: Option<Cow<'static, str>>,
    test: Arc<PredicateFn<R>>,
}

impl<R> Predicate<R> {
    /// Wrap `test`, deriving the name from the function item when there is
    /// one. Closures stay anonymous.
    pub fn new<F>(test: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        Self {
            name: declared_name::<F>().map(Cow::Borrowed),
            test: Arc::new(test),
        }
    }

    pub fn named<F>(name: impl Into<Cow<'static, str>>, test: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            test: Arc::new(test),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Run the predicate. Panics raised by it are not caught.
    pub fn test(&self, request: &R) -> bool {
        (self.test)(request)
    }
}

impl<R> Clone for Predicate<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<R> fmt::Debug for Predicate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("name", &self.name().unwrap_or(ANONYMOUS))
            .finish_non_exhaustive()
    }
}

/// Last path segment of a function item's type name, generic arguments
/// stripped. Closures, function pointers and library wrappers such as `Box`
/// yield `None`.
///
/// `std::any::type_name` output is best effort and may change between
/// compiler releases. Use [`Predicate::named`] or [`Query::named`] when the
/// failure text must stay fixed.
fn declared_name<F>() -> Option<&'static str> {
    let full = std::any::type_name::<F>().trim_start_matches('&');
    let (path, args) = full.split_at(full.find('<').unwrap_or(full.len()));
    if !args.is_empty() && !generic_args_close_at_end(args) {
        return None;
    }
    if path.contains("{{closure}}") || path.contains('(') || path.contains(' ') {
        return None;
    }
    if ["alloc::", "core::", "std::"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return None;
    }
    path.rsplit("::").next().filter(|segment| !segment.is_empty())
}

/// True when `args` is one balanced `<...>` group ending the string. The `>`
/// of a `->` arrow is not a closing bracket.
fn generic_args_close_at_end(args: &str) -> bool {
    let mut depth = 0usize;
    let mut previous = ' ';
    for (index, ch) in args.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' if previous != '-' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return index + 1 == args.len();
                }
            }
            _ => {}
        }
        previous = ch;
    }
    false
}

/// How the registry locates pending requests.
pub enum Query<R = Request> {
    /// Exact URL equality; the method is not checked.
    Url(String),
    /// Exact URL equality plus case-insensitive method equality. Neither side
    /// acts as a wildcard.
    Request { url: String, method: String },
    /// Arbitrary test over the descriptor.
    Predicate(Predicate<R>),
}

impl<R> Query<R> {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn request(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Request {
            url: url.into(),
            method: method.into(),
        }
    }

    /// Build a descriptor query from any request value. Only its URL and
    /// method are retained.
    pub fn from_descriptor<D: RequestDescriptor + ?Sized>(descriptor: &D) -> Self {
        Self::request(descriptor.method(), descriptor.url())
    }

    pub fn matching<F>(test: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Predicate::new(test))
    }

    pub fn named<F>(name: impl Into<Cow<'static, str>>, test: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Predicate::named(name, test))
    }

    /// Human-readable form used in failure messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => format!("URL: {url}"),
            Self::Request { url, method } => {
                format!("method: {}, URL: {url}", method.to_ascii_uppercase())
            }
            Self::Predicate(predicate) => {
                format!("function: {}", predicate.name().unwrap_or(ANONYMOUS))
            }
        }
    }
}

impl<R> Clone for Query<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Url(url) => Self::Url(url.clone()),
            Self::Request { url, method } => Self::Request {
                url: url.clone(),
                method: method.clone(),
            },
            Self::Predicate(predicate) => Self::Predicate(predicate.clone()),
        }
    }
}

impl<R> fmt::Debug for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Request { url, method } => f
                .debug_struct("Request")
                .field("url", url)
                .field("method", method)
                .finish(),
            Self::Predicate(predicate) => f.debug_tuple("Predicate").field(predicate).finish(),
        }
    }
}

impl<R> fmt::Display for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl<R> From<&str> for Query<R> {
    fn from(url: &str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl<R> From<String> for Query<R> {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl<R> From<&String> for Query<R> {
    fn from(url: &String) -> Self {
        Self::Url(url.clone())
    }
}

impl<R> From<&Request> for Query<R> {
    fn from(request: &Request) -> Self {
        Self::from_descriptor(request)
    }
}

impl<R> From<Request> for Query<R> {
    fn from(request: Request) -> Self {
        Self::from_descriptor(&request)
    }
}

impl<R> From<Predicate<R>> for Query<R> {
    fn from(predicate: Predicate<R>) -> Self {
        Self::Predicate(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_users_endpoint(request: &Request) -> bool {
        request.url() == "/users"
    }

    fn carries_headers<Shape>(request: &Request) -> bool {
        !request.headers().is_empty()
    }

    #[test]
    fn describes_url_queries() {
        let query: Query = "/users".into();
        assert_eq!(query.describe(), "URL: /users");
    }

    #[test]
    fn describes_descriptor_queries_with_uppercase_method() {
        let query: Query = Query::request("post", "/users");
        assert_eq!(query.to_string(), "method: POST, URL: /users");

        let from_request: Query = (&Request::put("/users/1")).into();
        assert_eq!(from_request.describe(), "method: PUT, URL: /users/1");
    }

    #[test]
    fn named_function_items_keep_their_name() {
        let query: Query = Query::matching(is_users_endpoint);
        assert_eq!(query.describe(), "function: is_users_endpoint");
    }

    #[test]
    fn generic_function_items_drop_their_type_arguments() {
        let tuple_args: Query = Query::matching(carries_headers::<Vec<(u8, u8)>>);
        assert_eq!(tuple_args.describe(), "function: carries_headers");

        let arrow_args: Query = Query::matching(carries_headers::<fn(u8) -> bool>);
        assert_eq!(arrow_args.describe(), "function: carries_headers");
    }

    #[test]
    fn boxed_callables_are_anonymous() {
        let boxed: Box<dyn Fn(&Request) -> bool + Send + Sync> = Box::new(is_users_endpoint);
        let query: Query = Query::matching(boxed);
        assert_eq!(query.describe(), "function: <anonymous>");
    }

    #[test]
    fn closures_are_anonymous_unless_named() {
        let anonymous: Query = Query::matching(|request: &Request| request.method() == "GET");
        assert_eq!(anonymous.describe(), "function: <anonymous>");

        let named: Query = Query::named("only_gets", |request: &Request| request.method() == "GET");
        assert_eq!(named.describe(), "function: only_gets");
    }

    #[test]
    fn predicate_debug_shows_name() {
        let predicate = Predicate::<Request>::named("by_id", |_| true);
        assert_eq!(
            format!("{predicate:?}"),
            r#"Predicate { name: "by_id", .. }"#
        );
    }
}
