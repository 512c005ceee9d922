//! HTTP response head.

use crate::multimap::CiMultiMap;
use http::{StatusCode, Version};

/// Status line and headers of a response, encoded by
/// [`HeaderEncoder`](crate::codec::HeaderEncoder) before the body.
///
/// Framing headers (`Content-Length`, `Transfer-Encoding`) are derived from the
/// [`PayloadSize`](crate::protocol::PayloadSize) at encoding time and should not be set here.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    version: Version,
    status: StatusCode,
    headers: CiMultiMap<String>,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self { version: Version::HTTP_11, status, headers: CiMultiMap::new() }
    }

    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.add(name, value.into());
        self
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &CiMultiMap<String> {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut CiMultiMap<String> {
        &mut self.headers
    }
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}
