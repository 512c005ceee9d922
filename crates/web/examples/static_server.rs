//! Serves the directory given as first argument under `/static/`, plus two
//! dynamic routes. One request per connection.
//!
//! ```text
//! cargo run -p rill-web --example static_server -- ./public
//! curl -v http://127.0.0.1:8080/static/index.html
//! curl -v --compressed http://127.0.0.1:8080/hello/rill
//! ```

use bytes::BytesMut;
use futures::FutureExt;
use futures::future::BoxFuture;
use http::{Method, StatusCode};
use rill_http::codec::ContentCoding;
use rill_http::connection::{HttpStream, PayloadWriter};
use rill_http::protocol::{PayloadSize, RequestHeader, ResponseHead};
use rill_web::{
    Handler, HandlerError, RequestContext, RouteOptions, StaticOptions, UrlDispatcher, View, handler_fn,
    write_error_response,
};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const MAX_HEADERS: usize = 64;
const MAX_HEAD_SIZE: usize = 16 * 1024;

fn index<'r>(req: &'r RequestContext<'r>, writer: &'r mut PayloadWriter) -> BoxFuture<'r, Result<(), HandlerError>> {
    async move {
        let body = "try /hello/{name} or /static/{filename}\n";
        let head = ResponseHead::new(StatusCode::OK)
            .with_version(req.version())
            .with_header("Content-Type", mime::TEXT_PLAIN_UTF_8.as_ref());
        writer.write_head(head, PayloadSize::Length(body.len() as u64))?;
        writer.write(body, true).await?;
        Ok(())
    }
    .boxed()
}

/// Streams a greeting, compressed when the client accepts it.
fn hello<'r>(req: &'r RequestContext<'r>, writer: &'r mut PayloadWriter) -> BoxFuture<'r, Result<(), HandlerError>> {
    async move {
        let name = req.path_params().get("name").unwrap_or("world");
        let coding = req.headers().get("accept-encoding").ok().and_then(|value| ContentCoding::select(value));
        if let Some(coding) = coding {
            writer.enable_compression(coding)?;
        }

        let head = ResponseHead::new(StatusCode::OK)
            .with_version(req.version())
            .with_header("Content-Type", mime::TEXT_PLAIN_UTF_8.as_ref());
        writer.write_head(head, PayloadSize::Chunked)?;
        for _ in 0..3 {
            writer.write(format!("hello, {name}!\n"), true).await?;
        }
        Ok(())
    }
    .boxed()
}

fn echo_method<'r>(
    req: &'r RequestContext<'r>,
    writer: &'r mut PayloadWriter,
) -> BoxFuture<'r, Result<(), HandlerError>> {
    async move {
        let body = format!("{} {}\n", req.method(), req.path());
        writer.write_head(ResponseHead::new(StatusCode::OK), PayloadSize::Length(body.len() as u64))?;
        writer.write(body, true).await?;
        Ok(())
    }
    .boxed()
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let directory = std::env::args().nth(1).unwrap_or_else(|| ".".to_owned());

    let mut dispatcher = UrlDispatcher::new();
    dispatcher
        .add_route("GET", "/", Handler::new(handler_fn(index)), RouteOptions::new().name("index"))
        .expect("index route");
    dispatcher
        .add_route("GET", r"/hello/{name:[a-z]+}", Handler::new(handler_fn(hello)), RouteOptions::new().name("hello"))
        .expect("hello route");
    let view = View::new().method(Method::GET, handler_fn(echo_method)).method(Method::POST, handler_fn(echo_method));
    dispatcher.add_route("*", "/echo", Handler::view(view), RouteOptions::new()).expect("echo route");
    dispatcher.add_static("/static", &directory, StaticOptions::new().name("static")).expect("static route");

    if let Some(resource) = dispatcher.get("static") {
        info!(url = %resource.url(&[("filename", "index.html")], &[]).unwrap_or_default(), "serving {directory}");
    }

    let dispatcher = Arc::new(dispatcher);
    let listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };
    info!("start listening at 127.0.0.1:8080");

    loop {
        let (tcp_stream, remote_addr) = match listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            match serve(&dispatcher, tcp_stream).await {
                Ok(()) => debug!(%remote_addr, "connection finished"),
                Err(e) => error!(%remote_addr, cause = %e, "connection failed"),
            }
        });
    }
}

async fn serve(dispatcher: &UrlDispatcher, mut tcp_stream: TcpStream) -> io::Result<()> {
    let Some(request) = read_head(&mut tcp_stream).await? else {
        return Ok(());
    };
    info!(method = %request.method(), path = request.raw_path(), "request");

    let stream = HttpStream::with_transport(Box::new(tcp_stream))?;
    stream.set_tcp_nodelay(true)?;
    let mut writer = PayloadWriter::new(&stream);

    if let Err(e) = dispatcher.handle(&request, &mut writer).await {
        debug!(cause = %e, "handler failed");
        if let Err(send_error) = write_error_response(&e, &request, &mut writer).await {
            warn!(cause = %send_error, "cannot report handler failure, closing connection");
            stream.close();
            return Ok(());
        }
    }

    if let Some(mut transport) = stream.take_transport() {
        transport.shutdown().await?;
    }
    Ok(())
}

/// Reads and parses a request head, `None` if the client went away first.
async fn read_head(tcp_stream: &mut TcpStream) -> io::Result<Option<RequestHeader>> {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if tcp_stream.read_buf(&mut buf).await? == 0 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);
        match parsed.parse(&buf) {
            Ok(httparse::Status::Complete(_)) => {
                return RequestHeader::try_from(parsed).map(Some).map_err(io::Error::other);
            }
            Ok(httparse::Status::Partial) if buf.len() < MAX_HEAD_SIZE => {}
            Ok(httparse::Status::Partial) => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "request head too large"));
            }
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }
}
