use crate::{HandlerError, RequestContext};
use async_trait::async_trait;
use futures::future::BoxFuture;
use http::{Method, Version};
use rill_http::connection::PayloadWriter;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Produces the response for a matched request.
///
/// The handler writes head and body through `writer`; the dispatcher
/// finalizes the writer once the handler returns `Ok`.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: &RequestContext<'_>, writer: &mut PayloadWriter) -> Result<(), HandlerError>;
}

/// a [`RequestHandler`] backed by a function returning a boxed future
pub struct FnHandler<F> {
    f: F,
}

/// Turns a function or closure into a [`RequestHandler`].
///
/// ```
/// use futures::FutureExt;
/// use rill_web::handler_fn;
///
/// let hello = handler_fn(|_req, writer| async move { Ok(writer.write("hello", true).await?) }.boxed());
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'r> Fn(&'r RequestContext<'r>, &'r mut PayloadWriter) -> BoxFuture<'r, Result<(), HandlerError>>
        + Send
        + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> RequestHandler for FnHandler<F>
where
    F: for<'r> Fn(&'r RequestContext<'r>, &'r mut PayloadWriter) -> BoxFuture<'r, Result<(), HandlerError>>
        + Send
        + Sync,
{
    async fn invoke(&self, req: &RequestContext<'_>, writer: &mut PayloadWriter) -> Result<(), HandlerError> {
        (self.f)(req, writer).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

/// The handler of a route.
#[derive(Clone)]
pub enum Handler {
    /// serves every method the route accepts
    Plain(Arc<dyn RequestHandler>),
    /// dispatches on the request method
    View(Arc<View>),
}

impl Handler {
    pub fn new<H: RequestHandler + 'static>(handler: H) -> Self {
        Handler::Plain(Arc::new(handler))
    }

    pub fn view(view: View) -> Self {
        Handler::View(Arc::new(view))
    }

    pub async fn call(&self, req: &RequestContext<'_>, writer: &mut PayloadWriter) -> Result<(), HandlerError> {
        match self {
            Handler::Plain(handler) => handler.invoke(req, writer).await,
            Handler::View(view) => view.invoke(req, writer).await,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Plain(_) => f.write_str("Handler::Plain"),
            Handler::View(view) => f.debug_tuple("Handler::View").field(view).finish(),
        }
    }
}

/// A table of handlers keyed by request method.
///
/// A request whose method has no entry fails with
/// [`HandlerError::MethodNotAllowed`] listing the methods the view implements.
#[derive(Default)]
pub struct View {
    handlers: Vec<(Method, Arc<dyn RequestHandler>)>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handler for `method`, replacing an earlier one.
    #[must_use]
    pub fn method<H: RequestHandler + 'static>(mut self, method: Method, handler: H) -> Self {
        self.handlers.retain(|(m, _)| *m != method);
        self.handlers.push((method, Arc::new(handler)));
        self
    }

    pub fn allowed_methods(&self) -> Vec<Method> {
        self.handlers.iter().map(|(method, _)| method.clone()).collect()
    }
}

#[async_trait]
impl RequestHandler for View {
    async fn invoke(&self, req: &RequestContext<'_>, writer: &mut PayloadWriter) -> Result<(), HandlerError> {
        let handler = self.handlers.iter().find(|(method, _)| method == req.method()).map(|(_, handler)| handler);
        match handler {
            Some(handler) => handler.invoke(req, writer).await,
            None => Err(HandlerError::MethodNotAllowed { method: req.method().clone(), allowed: self.allowed_methods() }),
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View").field("methods", &self.allowed_methods()).finish()
    }
}

/// Answers `Expect: 100-continue` before the route handler runs.
///
/// Returning an error skips the handler; the error is reported like any
/// handler error.
#[async_trait]
pub trait ExpectHandler: Send + Sync {
    async fn expect(&self, req: &RequestContext<'_>, writer: &mut PayloadWriter) -> Result<(), HandlerError>;
}

/// Sends `100 Continue` to HTTP/1.1 clients, does nothing for older versions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueExpectHandler;

#[async_trait]
impl ExpectHandler for ContinueExpectHandler {
    async fn expect(&self, req: &RequestContext<'_>, writer: &mut PayloadWriter) -> Result<(), HandlerError> {
        if req.version() == Version::HTTP_11 {
            trace!("receive expect request header, sent continue response");
            writer.buffer_data(b"HTTP/1.1 100 Continue\r\n\r\n");
            writer.drain().await?;
        }
        Ok(())
    }
}
