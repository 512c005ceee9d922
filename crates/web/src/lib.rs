//! Url dispatching and static file serving on top of [`rill_http`].
//!
//! Register handlers on a [`UrlDispatcher`], then hand every parsed request to
//! [`UrlDispatcher::handle`] together with the [`PayloadWriter`](rill_http::connection::PayloadWriter)
//! of its response. Requests that do not resolve come back as
//! [`HandlerError`]s, which [`write_error_response`] turns into status responses.
//!
//! ```no_run
//! use futures::FutureExt;
//! use http::StatusCode;
//! use rill_http::protocol::{PayloadSize, ResponseHead};
//! use rill_web::{Handler, RouteOptions, StaticOptions, UrlDispatcher, handler_fn};
//!
//! # fn main() -> Result<(), rill_web::router::RouterError> {
//! let mut dispatcher = UrlDispatcher::new();
//! let hello = handler_fn(|req, writer| {
//!     async move {
//!         let body = format!("hello {}", req.path_params().get("name").unwrap_or("world"));
//!         writer.write_head(ResponseHead::new(StatusCode::OK), PayloadSize::Length(body.len() as u64))?;
//!         writer.write(body, true).await?;
//!         Ok(())
//!     }
//!     .boxed()
//! });
//! dispatcher.add_route("GET", "/hello/{name}", Handler::new(hello), RouteOptions::new().name("hello"))?;
//! dispatcher.add_static("/static", "./public", StaticOptions::new())?;
//! # Ok(())
//! # }
//! ```

mod handler;
mod request;
mod response;

pub mod router;
pub mod static_files;

pub use handler::ContinueExpectHandler;
pub use handler::ExpectHandler;
pub use handler::FnHandler;
pub use handler::Handler;
pub use handler::RequestHandler;
pub use handler::View;
pub use handler::handler_fn;
pub use request::PathParams;
pub use request::RequestContext;
pub use response::HandlerError;
pub use response::write_error_response;
pub use router::Resolution;
pub use router::RouteOptions;
pub use router::UrlDispatcher;
pub use static_files::StaticOptions;
pub use static_files::StaticRoute;
