//! Serving files from a directory.
//!
//! [`StaticRoute`] is the handler behind
//! [`UrlDispatcher::add_static`](crate::router::UrlDispatcher::add_static). It
//! maps the `filename` path variable onto a file below its directory and
//! streams it with `sendfile(2)` when the connection allows it, or in chunks
//! read into memory otherwise.

use crate::handler::ExpectHandler;
use crate::router::{RouterError, percent_decode};
use crate::{HandlerError, RequestContext, RequestHandler};
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use mime::Mime;
use rill_http::connection::PayloadWriter;
use rill_http::protocol::{PayloadSize, ResponseHead};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, trace, warn};

/// Bytes read per write when files are copied through memory.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Any non-empty value disables `sendfile(2)` for static routes created afterwards.
pub const NO_SENDFILE_ENV: &str = "RILL_NOSENDFILE";

/// Settings of [`UrlDispatcher::add_static`](crate::router::UrlDispatcher::add_static).
#[derive(Clone)]
pub struct StaticOptions {
    pub(crate) name: Option<String>,
    pub(crate) chunk_size: usize,
    pub(crate) expect_handler: Option<Arc<dyn ExpectHandler>>,
    pub(crate) sendfile: bool,
}

impl StaticOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn expect_handler<E: ExpectHandler + 'static>(mut self, expect_handler: E) -> Self {
        self.expect_handler = Some(Arc::new(expect_handler));
        self
    }

    /// Allows the zero-copy path, on by default.
    #[must_use]
    pub fn sendfile(mut self, sendfile: bool) -> Self {
        self.sendfile = sendfile;
        self
    }
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self { name: None, chunk_size: DEFAULT_CHUNK_SIZE, expect_handler: None, sendfile: true }
    }
}

impl fmt::Debug for StaticOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticOptions")
            .field("name", &self.name)
            .field("chunk_size", &self.chunk_size)
            .field("expect_handler", &self.expect_handler.is_some())
            .field("sendfile", &self.sendfile)
            .finish()
    }
}

/// Serves the regular files below one directory.
///
/// Requests for paths that escape the directory, do not exist or are not
/// regular files all fail with the same [`HandlerError::NotFound`].
#[derive(Debug, Clone)]
pub struct StaticRoute {
    directory: PathBuf,
    chunk_size: usize,
    sendfile: bool,
}

impl StaticRoute {
    pub fn new<P: AsRef<Path>>(directory: P, options: &StaticOptions) -> Result<Self, RouterError> {
        let directory = directory.as_ref();
        let absolute = std::path::absolute(directory)
            .map_err(|_io_error| RouterError::InvalidDirectory { path: directory.to_path_buf() })?;
        let directory = normalize(&absolute);
        if !directory.is_dir() {
            return Err(RouterError::InvalidDirectory { path: directory });
        }

        let disabled = std::env::var_os(NO_SENDFILE_ENV).is_some_and(|value| !value.is_empty());
        if disabled {
            debug!(env = NO_SENDFILE_ENV, "sendfile disabled by environment");
        }

        Ok(Self { directory, chunk_size: options.chunk_size.max(1), sendfile: options.sendfile && !disabled })
    }

    /// The absolute, normalized root.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn use_sendfile(&self) -> bool {
        self.sendfile
    }

    /// The file `filename` names below the root, `None` when it escapes it.
    fn file_path(&self, filename: &str) -> Option<PathBuf> {
        let path = normalize(&self.directory.join(percent_decode(filename)));
        path.starts_with(&self.directory).then_some(path)
    }

    async fn send(
        &self,
        writer: &mut PayloadWriter,
        head: ResponseHead,
        file: &mut File,
        size: u64,
    ) -> Result<(), HandlerError> {
        writer.write_head(head, PayloadSize::Length(size))?;

        if self.sendfile {
            // the transport may still be busy with an earlier response
            writer.drain().await?;
            if writer.can_send_file() {
                let sent = writer.send_file(file, 0, size).await?;
                if sent < size {
                    warn!(sent, size, "file shrank while it was sent");
                }
                trace!(sent, "file sent with sendfile");
                return Ok(());
            }
            debug!("transport cannot sendfile, copying through memory");
        }

        self.copy(writer, file, size).await
    }

    async fn copy(&self, writer: &mut PayloadWriter, file: &mut File, size: u64) -> Result<(), HandlerError> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut remaining = size;

        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(self.chunk_size, |r| r.min(self.chunk_size));
            let n = file.read(&mut buf[..want]).await?;
            if n == 0 {
                warn!(remaining, "file ended before its recorded size");
                break;
            }
            writer.write(Bytes::copy_from_slice(&buf[..n]), false).await?;
            writer.drain().await?;
            remaining -= n as u64;
        }
        Ok(())
    }
}

#[async_trait]
impl RequestHandler for StaticRoute {
    async fn invoke(&self, req: &RequestContext<'_>, writer: &mut PayloadWriter) -> Result<(), HandlerError> {
        let filename = req.path_params().get("filename").unwrap_or_default();
        let Some(path) = self.file_path(filename) else {
            debug!(filename, "path escapes the static directory");
            return Err(HandlerError::NotFound);
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                debug!(path = %path.display(), "not a regular file");
                return Err(HandlerError::NotFound);
            }
            Err(e) => {
                debug!(path = %path.display(), cause = %e, "file not accessible");
                return Err(HandlerError::NotFound);
            }
        };

        let modified = whole_seconds(metadata.modified()?);
        if let Some(since) = req.request_header().if_modified_since() {
            if modified <= since {
                return Err(HandlerError::NotModified);
            }
        }

        let (content_type, encoding) = guess_type(&path);
        let mut head = ResponseHead::new(StatusCode::OK)
            .with_version(req.version())
            .with_header(http::header::CONTENT_TYPE.as_str(), content_type.to_string());
        if let Some(encoding) = encoding {
            head = head.with_header(http::header::CONTENT_ENCODING.as_str(), encoding);
        }
        head = head.with_header(http::header::LAST_MODIFIED.as_str(), httpdate::fmt_http_date(modified));

        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                debug!(path = %path.display(), cause = %e, "file cannot be opened");
                return Err(HandlerError::NotFound);
            }
        };

        writer.set_tcp_cork(true)?;
        let result = self.send(writer, head, &mut file, metadata.len()).await;
        if let Err(e) = writer.set_tcp_nodelay(true) {
            warn!(cause = %e, "failed to restore TCP_NODELAY");
        }
        result
    }
}

/// Resolves `.` and `..` without touching the filesystem; `..` never climbs above the root.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// `Last-Modified` only has second precision.
fn whole_seconds(time: SystemTime) -> SystemTime {
    let secs = time.duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Content type and content coding of a file, from its extensions.
///
/// `report.csv.gz` is `text/csv` with coding `gzip`.
fn guess_type(path: &Path) -> (Mime, Option<&'static str>) {
    let mut path = path.to_path_buf();
    let encoding = match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Some("gzip"),
        Some("br") => Some("br"),
        Some("zst") => Some("zstd"),
        Some("bz2") => Some("bzip2"),
        Some("xz") => Some("xz"),
        Some("Z") => Some("compress"),
        _ => None,
    };
    if encoding.is_some() {
        path.set_extension("");
    }

    let ext = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    (ext.as_deref().map_or(mime::APPLICATION_OCTET_STREAM, mime_for), encoding)
}

fn mime_for(ext: &str) -> Mime {
    match ext {
        "html" | "htm" => mime::TEXT_HTML,
        "css" => mime::TEXT_CSS,
        "js" | "mjs" => mime::TEXT_JAVASCRIPT,
        "txt" => mime::TEXT_PLAIN,
        "csv" => mime::TEXT_CSV,
        "xml" => mime::TEXT_XML,
        "json" => mime::APPLICATION_JSON,
        "pdf" => mime::APPLICATION_PDF,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "svg" => mime::IMAGE_SVG,
        "bmp" => mime::IMAGE_BMP,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        other => OTHER_TYPES
            .iter()
            .find(|(known, _)| *known == other)
            .and_then(|(_, essence)| essence.parse().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
    }
}

/// Types `mime` has no constant for.
const OTHER_TYPES: &[(&str, &str)] = &[
    ("ico", "image/vnd.microsoft.icon"),
    ("webp", "image/webp"),
    ("wasm", "application/wasm"),
    ("tar", "application/x-tar"),
    ("zip", "application/zip"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
    ("md", "text/markdown"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathParams;
    use http::Method;
    use rill_http::connection::HttpStream;
    use rill_http::protocol::RequestHeader;
    use tempfile::TempDir;
    use tokio::io::{AsyncRead, AsyncReadExt};

    /// `root/` with `hello.txt`, `data.json.gz` and `sub/`, next to `secret.txt`.
    fn fixture() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("hello.txt"), "hello world").unwrap();
        std::fs::write(root.join("data.json.gz"), [0x1f, 0x8b, 0x08]).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "secret").unwrap();
        (dir, root)
    }

    async fn invoke(route: &StaticRoute, request: &RequestHeader, filename: &str) -> (Result<(), HandlerError>, String) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let stream = HttpStream::with_transport(Box::new(server)).unwrap();
        let mut writer = PayloadWriter::new(&stream);
        let params = PathParams::from_iter([("filename", filename)]);

        let result = route.invoke(&RequestContext::new(request, &params), &mut writer).await;
        assert!(!writer.tcp_cork());
        if result.is_ok() {
            assert!(writer.tcp_nodelay());
        } else {
            assert!(!writer.is_started());
        }
        writer.finalize(Bytes::new()).await.unwrap();
        drop(stream.take_transport());
        (result, read_to_string(client).await)
    }

    async fn read_to_string<R: AsyncRead + Unpin>(mut reader: R) -> String {
        let mut received = String::new();
        reader.read_to_string(&mut received).await.unwrap();
        received
    }

    fn get() -> RequestHeader {
        RequestHeader::new(Method::GET, "/static/")
    }

    #[tokio::test]
    async fn test_serves_file_through_memory() {
        let (_dir, root) = fixture();
        let route = StaticRoute::new(&root, &StaticOptions::new().chunk_size(4)).unwrap();

        let (result, received) = invoke(&route, &get(), "hello.txt").await;
        result.unwrap();
        assert!(received.starts_with("HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\n"));
        assert!(received.contains("last-modified: "));
        assert!(received.contains("content-length: 11\r\n"));
        assert!(received.ends_with("\r\n\r\nhello world"));
    }

    #[tokio::test]
    async fn test_compressed_file_gets_content_encoding() {
        let (_dir, root) = fixture();
        let route = StaticRoute::new(&root, &StaticOptions::new()).unwrap();

        let (mut client, server) = tokio::io::duplex(4096);
        let stream = HttpStream::with_transport(Box::new(server)).unwrap();
        let mut writer = PayloadWriter::new(&stream);
        let params = PathParams::from_iter([("filename", "data.json.gz")]);
        route.invoke(&RequestContext::new(&get(), &params), &mut writer).await.unwrap();
        writer.finalize(Bytes::new()).await.unwrap();
        drop(stream.take_transport());

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        let head = String::from_utf8_lossy(&received);
        assert!(head.contains("content-type: application/json\r\n"));
        assert!(head.contains("content-encoding: gzip\r\n"));
        assert!(received.ends_with(&[0x1f, 0x8b, 0x08]));
    }

    #[tokio::test]
    async fn test_traversal_is_not_found() {
        let (_dir, root) = fixture();
        let route = StaticRoute::new(&root, &StaticOptions::new()).unwrap();

        for filename in ["../secret.txt", "../../etc/passwd", "..%2Fsecret.txt", "sub/../../secret.txt", "/etc/passwd"] {
            let (result, received) = invoke(&route, &get(), filename).await;
            assert!(matches!(result, Err(HandlerError::NotFound)), "{filename} should not be served");
            assert!(received.is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_file_and_directory_are_not_found() {
        let (_dir, root) = fixture();
        let route = StaticRoute::new(&root, &StaticOptions::new()).unwrap();

        for filename in ["missing.txt", "sub", "sub/", ""] {
            let (result, _) = invoke(&route, &get(), filename).await;
            assert!(matches!(result, Err(HandlerError::NotFound)), "{filename:?} should not be served");
        }
    }

    #[tokio::test]
    async fn test_dot_segments_inside_root_are_served() {
        let (_dir, root) = fixture();
        let route = StaticRoute::new(&root, &StaticOptions::new()).unwrap();

        let (result, received) = invoke(&route, &get(), "sub/../hello%2Etxt").await;
        result.unwrap();
        assert!(received.ends_with("hello world"));
    }

    #[tokio::test]
    async fn test_if_modified_since() {
        let (_dir, root) = fixture();
        let route = StaticRoute::new(&root, &StaticOptions::new()).unwrap();

        let later = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(3600));
        let request = get().with_header("If-Modified-Since", later);
        let (result, received) = invoke(&route, &request, "hello.txt").await;
        assert!(matches!(result, Err(HandlerError::NotModified)));
        assert!(received.is_empty());

        let earlier = httpdate::fmt_http_date(SystemTime::now() - Duration::from_secs(3600));
        let request = get().with_header("If-Modified-Since", earlier);
        let (result, received) = invoke(&route, &request, "hello.txt").await;
        result.unwrap();
        assert!(received.ends_with("hello world"));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = StaticRoute::new(dir.path().join("nope"), &StaticOptions::new());
        assert!(matches!(missing, Err(RouterError::InvalidDirectory { .. })));

        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(StaticRoute::new(&file, &StaticOptions::new()), Err(RouterError::InvalidDirectory { .. })));
    }

    #[test]
    fn test_directory_is_normalized() {
        let (_dir, root) = fixture();
        let route = StaticRoute::new(root.join("sub/./.."), &StaticOptions::new().sendfile(false)).unwrap();
        assert_eq!(route.directory(), root.as_path());
        assert!(!route.use_sendfile());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/../../..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("/srv/static/../../etc/passwd")), PathBuf::from("/etc/passwd"));
    }

    #[test]
    fn test_guess_type() {
        assert_eq!(guess_type(Path::new("index.html")), (mime::TEXT_HTML, None));
        assert_eq!(guess_type(Path::new("APP.JS")), (mime::TEXT_JAVASCRIPT, None));
        assert_eq!(guess_type(Path::new("report.csv.gz")), (mime::TEXT_CSV, Some("gzip")));
        assert_eq!(guess_type(Path::new("bundle.wasm")).0.essence_str(), "application/wasm");
        assert_eq!(guess_type(Path::new("archive.tar.zst")).0.essence_str(), "application/x-tar");
        assert_eq!(guess_type(Path::new("Makefile")), (mime::APPLICATION_OCTET_STREAM, None));
        assert_eq!(guess_type(Path::new("blob.gz")), (mime::APPLICATION_OCTET_STREAM, Some("gzip")));
    }

    #[test]
    fn test_whole_seconds() {
        let time = UNIX_EPOCH + Duration::from_millis(1_500);
        assert_eq!(whole_seconds(time), UNIX_EPOCH + Duration::from_secs(1));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_serves_file_with_sendfile() {
        use tokio::net::{TcpListener, TcpStream};

        let (_dir, root) = fixture();
        let big = "0123456789".repeat(20_000);
        std::fs::write(root.join("big.txt"), &big).unwrap();
        let route = StaticRoute::new(&root, &StaticOptions::new()).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();

        let reader = tokio::spawn(read_to_string(client));

        let stream = HttpStream::with_transport(Box::new(server)).unwrap();
        let mut writer = PayloadWriter::new(&stream);
        assert!(writer.can_send_file() || !route.use_sendfile());
        let params = PathParams::from_iter([("filename", "big.txt")]);
        route.invoke(&RequestContext::new(&get(), &params), &mut writer).await.unwrap();
        writer.finalize(Bytes::new()).await.unwrap();
        assert_eq!(writer.remaining_length(), Some(0));
        drop(stream.take_transport());

        let received = reader.await.unwrap();
        assert!(received.contains("content-length: 200000\r\n"));
        assert!(received.ends_with(&big));
    }
}
