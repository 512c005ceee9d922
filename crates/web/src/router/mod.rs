//! Url dispatching.
//!
//! A [`UrlDispatcher`] holds [`Resource`]s in registration order. Each resource
//! matches paths in one of three ways (see [`ResourceKind`]) and owns the
//! [`Route`]s that bind handlers to methods. Resolution scans the resources in
//! order; the first one that matches the path and has a route for the method
//! wins.

mod error;
mod resource;
mod route;
mod template;

pub use error::RouterError;
pub use resource::Resource;
pub use resource::ResourceKind;
pub use route::Route;
pub use route::RouteMethod;
pub use template::PathTemplate;
pub(crate) use template::percent_decode;

use crate::handler::{ExpectHandler, Handler};
use crate::static_files::{StaticOptions, StaticRoute};
use crate::{HandlerError, PathParams, RequestContext};
use bytes::Bytes;
use http::Method;
use rill_http::connection::PayloadWriter;
use rill_http::protocol::RequestHeader;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Optional settings of [`UrlDispatcher::add_route`].
#[derive(Default, Clone)]
pub struct RouteOptions {
    name: Option<String>,
    expect_handler: Option<Arc<dyn ExpectHandler>>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the resource so it can be looked up with [`UrlDispatcher::get`].
    #[must_use]
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces the default `100 Continue` answer to `Expect` headers.
    #[must_use]
    pub fn expect_handler<E: ExpectHandler + 'static>(mut self, expect_handler: E) -> Self {
        self.expect_handler = Some(Arc::new(expect_handler));
        self
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("name", &self.name)
            .field("expect_handler", &self.expect_handler.is_some())
            .finish()
    }
}

/// The route selected for a request, with the variables captured from its path.
#[derive(Debug)]
pub struct MatchInfo<'a> {
    resource: &'a Resource,
    route: &'a Route,
    params: PathParams,
}

impl<'a> MatchInfo<'a> {
    pub fn resource(&self) -> &'a Resource {
        self.resource
    }

    pub fn route(&self) -> &'a Route {
        self.route
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }
}

/// Outcome of [`UrlDispatcher::resolve`].
#[derive(Debug)]
pub enum Resolution<'a> {
    Matched(MatchInfo<'a>),
    /// no resource matches the path
    NotFound,
    /// some resources match the path, none of them has a route for `method`
    MethodNotAllowed { method: Method, allowed: Vec<Method> },
}

impl Resolution<'_> {
    pub fn is_matched(&self) -> bool {
        matches!(self, Resolution::Matched(_))
    }
}

/// Maps request paths and methods to handlers.
///
/// Every registration either succeeds completely or leaves the dispatcher
/// untouched.
#[derive(Debug, Default)]
pub struct UrlDispatcher {
    resources: Vec<Resource>,
    named: HashMap<String, usize>,
}

impl UrlDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource without routes; add them with [`Resource::add_route`].
    pub fn add_resource(&mut self, path: &str, name: Option<&str>) -> Result<&mut Resource, RouterError> {
        self.check_name(name)?;
        let resource = Resource::from_path(path, name.map(str::to_owned))?;
        let index = self.register(resource);
        Ok(&mut self.resources[index])
    }

    /// Registers `handler` for `method` on a new resource for `path`.
    ///
    /// `method` is `*` or one of GET, POST, PUT, DELETE, PATCH, HEAD and
    /// OPTIONS. `path` may contain `{var}` and `{var:regex}` segments.
    pub fn add_route(
        &mut self,
        method: &str,
        path: &str,
        handler: Handler,
        options: RouteOptions,
    ) -> Result<&Resource, RouterError> {
        self.check_name(options.name.as_deref())?;
        let mut resource = Resource::from_path(path, options.name)?;
        resource.add_route(method, handler, options.expect_handler)?;

        let index = self.register(resource);
        Ok(&self.resources[index])
    }

    /// Serves the files below `directory` for GET requests under `prefix`.
    ///
    /// A `/` is appended to the prefix when missing.
    pub fn add_static<P: AsRef<Path>>(
        &mut self,
        prefix: &str,
        directory: P,
        options: StaticOptions,
    ) -> Result<&Resource, RouterError> {
        if !prefix.starts_with('/') {
            return Err(RouterError::invalid_path(prefix, "prefix should be started with /"));
        }
        let prefix = if prefix.ends_with('/') { prefix.to_owned() } else { format!("{prefix}/") };
        self.check_name(options.name.as_deref())?;

        let route = StaticRoute::new(directory, &options)?;
        debug!(
            prefix = %prefix,
            directory = %route.directory().display(),
            sendfile = route.use_sendfile(),
            "static route added"
        );

        let mut resource = Resource::with_prefix(prefix, options.name);
        resource.add_route("GET", Handler::new(route), options.expect_handler)?;

        let index = self.register(resource);
        Ok(&self.resources[index])
    }

    fn check_name(&self, name: Option<&str>) -> Result<(), RouterError> {
        let Some(name) = name else {
            return Ok(());
        };
        template::validate_name(name)?;
        if self.named.contains_key(name) {
            return Err(RouterError::DuplicateName { name: name.to_owned() });
        }
        Ok(())
    }

    fn register(&mut self, resource: Resource) -> usize {
        let index = self.resources.len();
        if let Some(name) = resource.name() {
            self.named.insert(name.to_owned(), index);
        }
        trace!(path = resource.path(), name = resource.name(), "resource registered");
        self.resources.push(resource);
        index
    }

    /// Finds the route for a request.
    ///
    /// The query string is ignored; the path is matched still percent-encoded.
    pub fn resolve(&self, method: &Method, raw_path: &str) -> Resolution<'_> {
        let path = raw_path.split_once('?').map_or(raw_path, |(path, _)| path);
        let mut allowed = Vec::<Method>::new();

        for resource in &self.resources {
            let Some(params) = resource.match_path(path) else {
                continue;
            };
            if let Some(route) = resource.route_for(method) {
                return Resolution::Matched(MatchInfo { resource, route, params });
            }
            for route in resource.routes() {
                if let RouteMethod::Exact(m) = route.method() {
                    if !allowed.contains(m) {
                        allowed.push(m.clone());
                    }
                }
            }
        }

        if allowed.is_empty() {
            debug!(%method, path, "no resource matched");
            Resolution::NotFound
        } else {
            debug!(%method, path, ?allowed, "method not allowed");
            Resolution::MethodNotAllowed { method: method.clone(), allowed }
        }
    }

    /// Resolves the request and runs the handler, finalizing `writer` when it succeeds.
    ///
    /// An `Expect: 100-continue` request goes through the route's expect
    /// handler first. Unmatched requests fail with [`HandlerError::NotFound`] or
    /// [`HandlerError::MethodNotAllowed`]; nothing is written for them.
    pub async fn handle(&self, request: &RequestHeader, writer: &mut PayloadWriter) -> Result<(), HandlerError> {
        let info = match self.resolve(request.method(), request.raw_path()) {
            Resolution::Matched(info) => info,
            Resolution::NotFound => return Err(HandlerError::NotFound),
            Resolution::MethodNotAllowed { method, allowed } => {
                return Err(HandlerError::MethodNotAllowed { method, allowed });
            }
        };

        let req = RequestContext::new(request, &info.params);
        if request.expects_continue() {
            info.route.expect_handler().expect(&req, writer).await?;
        }
        info.route.handler().call(&req, writer).await?;
        writer.finalize(Bytes::new()).await?;
        Ok(())
    }

    /// The resource registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.named.get(name).map(|&index| &self.resources[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Number of named resources.
    pub fn len(&self) -> usize {
        self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }

    /// Every resource, in registration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.resources.iter().flat_map(Resource::routes)
    }

    pub fn named_resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.named.iter().map(|(name, &index)| (name.as_str(), &self.resources[index]))
    }
}
