//! Request information handed to handlers.
//!
//! - `RequestContext`: the request head plus the path variables of the matched resource
//! - `PathParams`: variables captured from the request path

use http::{Method, Version};
use rill_http::multimap::CiMultiMap;
use rill_http::protocol::RequestHeader;

/// Everything a handler gets to know about the request it serves.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'req> {
    request_header: &'req RequestHeader,
    path_params: &'req PathParams,
}

impl<'req> RequestContext<'req> {
    pub fn new(request_header: &'req RequestHeader, path_params: &'req PathParams) -> Self {
        Self { request_header, path_params }
    }

    pub fn request_header(&self) -> &'req RequestHeader {
        self.request_header
    }

    pub fn method(&self) -> &'req Method {
        self.request_header.method()
    }

    /// The request path without the query string, still percent-encoded.
    pub fn path(&self) -> &'req str {
        self.request_header.path()
    }

    pub fn version(&self) -> Version {
        self.request_header.version()
    }

    pub fn headers(&self) -> &'req CiMultiMap<String> {
        self.request_header.headers()
    }

    pub fn path_params(&self) -> &'req PathParams {
        self.path_params
    }
}

/// Variables captured from the request path, in pattern order.
///
/// Values of `{var}` segments are percent-decoded. The static route stores the
/// raw remainder after its prefix under `filename`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push((name.into(), value.into()));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { params: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
