//! HTTP request head.
//!
//! Request-line and header tokenizing happen upstream (`httparse`); this
//! module only turns the parsed pieces into an owned [`RequestHeader`] and
//! offers the accessors the dispatcher and the static route rely on.

use crate::multimap::{CiMultiMap, MultiMap};
use crate::protocol::ParseError;
use http::{Method, Version};
use std::time::SystemTime;

/// The head of an incoming request.
///
/// The path is kept as it arrived on the wire (percent-encoded, query
/// included). Header names are case-insensitive.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    method: Method,
    raw_path: String,
    version: Version,
    headers: CiMultiMap<String>,
}

impl RequestHeader {
    /// Creates an HTTP/1.1 head without headers.
    pub fn new<P: Into<String>>(method: Method, raw_path: P) -> Self {
        Self { method, raw_path: raw_path.into(), version: Version::HTTP_11, headers: CiMultiMap::new() }
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

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as received.
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// The request target without its query string, still percent-encoded.
    pub fn path(&self) -> &str {
        self.raw_path.split_once('?').map_or(self.raw_path.as_str(), |(path, _)| path)
    }

    /// The part after the first `?`, empty when there is none.
    pub fn query_string(&self) -> &str {
        self.raw_path.split_once('?').map_or("", |(_, query)| query)
    }

    /// Decodes the query string, keeping repeated arguments in order.
    pub fn query(&self) -> Result<MultiMap<String>, ParseError> {
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(self.query_string())
            .map_err(ParseError::invalid_query)?;
        Ok(pairs.into_iter().collect())
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &CiMultiMap<String> {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut CiMultiMap<String> {
        &mut self.headers
    }

    /// `If-Modified-Since` as a timestamp, `None` when absent or malformed.
    pub fn if_modified_since(&self) -> Option<SystemTime> {
        let value = self.headers.get(http::header::IF_MODIFIED_SINCE.as_str()).ok()?;
        httpdate::parse_http_date(value.trim()).ok()
    }

    /// Whether the client waits for an interim `100 Continue` before sending its body.
    pub fn expects_continue(&self) -> bool {
        self.headers
            .get(http::header::EXPECT.as_str())
            .is_ok_and(|value| value.trim().eq_ignore_ascii_case("100-continue"))
    }
}

/// Converts a request parsed by `httparse` into an owned head.
///
/// Header values must be valid UTF-8; only HTTP/1.0 and HTTP/1.1 are accepted.
impl<'headers, 'buf> TryFrom<httparse::Request<'headers, 'buf>> for RequestHeader {
    type Error = ParseError;

    fn try_from(req: httparse::Request<'headers, 'buf>) -> Result<Self, Self::Error> {
        let method = req.method.ok_or_else(|| ParseError::invalid_method("missing method"))?;
        let method = Method::from_bytes(method.as_bytes()).map_err(ParseError::invalid_method)?;

        let raw_path = match req.path {
            Some(path) if !path.is_empty() => path.to_owned(),
            _ => return Err(ParseError::invalid_uri("missing request target")),
        };

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            other => return Err(ParseError::InvalidVersion(other)),
        };

        let mut headers = CiMultiMap::with_capacity(req.headers.len());
        for header in req.headers.iter().filter(|header| !header.name.is_empty()) {
            let value = std::str::from_utf8(header.value).map_err(ParseError::invalid_header)?;
            headers.add(header.name, value.to_owned());
        }

        Ok(Self { method, raw_path, version, headers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::time::{Duration, UNIX_EPOCH};

    fn parse(raw: &str) -> Result<RequestHeader, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        req.parse(raw.as_bytes()).unwrap();
        RequestHeader::try_from(req)
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let header = parse(str).unwrap();

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.path(), "/index.html");
        assert_eq!(header.query_string(), "");
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get("accept").unwrap(), "*/*");
        assert_eq!(header.headers().get("HOST").unwrap(), "127.0.0.1:8080");
        assert_eq!(header.headers().get("user-agent").unwrap(), "curl/7.79.1");
        assert!(!header.expects_continue());
    }

    #[test]
    fn from_edge_with_query() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3&q=hello%20world HTTP/1.0
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Accept-Encoding: gzip, deflate, br
        Accept-Encoding: zstd

        "##};

        let header = parse(str).unwrap();

        assert_eq!(header.version(), Version::HTTP_10);
        assert_eq!(header.path(), "/index/");
        assert_eq!(header.raw_path(), "/index/?a=1&b=2&a=3&q=hello%20world");
        assert_eq!(header.query_string(), "a=1&b=2&a=3&q=hello%20world");
        assert_eq!(header.headers().get_all("accept-encoding").unwrap().len(), 2);

        let query = header.query().unwrap();
        assert_eq!(query.get_all("a").unwrap(), vec!["1", "3"]);
        assert_eq!(query.get_one("b").unwrap(), "2");
        assert_eq!(query.get("q").unwrap(), "hello world");
    }

    #[test]
    fn rejects_http_09_version() {
        let mut headers = [httparse::EMPTY_HEADER; 4];
        let req = httparse::Request { method: Some("GET"), path: Some("/"), version: Some(9), headers: &mut headers[..0] };
        assert!(matches!(RequestHeader::try_from(req), Err(ParseError::InvalidVersion(Some(9)))));
    }

    #[test]
    fn if_modified_since() {
        let header = RequestHeader::new(Method::GET, "/").with_header("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(header.if_modified_since(), Some(UNIX_EPOCH + Duration::from_secs(784_111_777)));

        let malformed = RequestHeader::new(Method::GET, "/").with_header("If-Modified-Since", "yesterday");
        assert_eq!(malformed.if_modified_since(), None);
        assert_eq!(RequestHeader::new(Method::GET, "/").if_modified_since(), None);
    }

    #[test]
    fn expects_continue() {
        let header = RequestHeader::new(Method::POST, "/upload").with_header("Expect", "100-Continue");
        assert!(header.expects_continue());
    }
}
