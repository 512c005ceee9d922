use crate::PathParams;
use crate::handler::{ExpectHandler, Handler};
use crate::router::route::{Route, RouteMethod};
use crate::router::template::PathTemplate;
use crate::router::RouterError;
use std::sync::Arc;

/// How a resource matches request paths.
#[derive(Debug, Clone)]
pub enum ResourceKind {
    /// exact string comparison
    Plain(String),
    /// anchored regex compiled from a template with `{var}` segments
    Dynamic(PathTemplate),
    /// every path below the prefix; the remainder is the `filename` variable
    Static(String),
}

/// A path pattern and the routes registered on it.
#[derive(Debug, Clone)]
pub struct Resource {
    name: Option<String>,
    kind: ResourceKind,
    routes: Vec<Route>,
}

impl Resource {
    /// A plain or dynamic resource, depending on whether `path` has braces.
    pub(crate) fn from_path(path: &str, name: Option<String>) -> Result<Self, RouterError> {
        if !path.starts_with('/') {
            return Err(RouterError::invalid_path(path, "path should be started with /"));
        }

        let kind = if path.contains(['{', '}']) {
            ResourceKind::Dynamic(PathTemplate::compile(path)?)
        } else {
            ResourceKind::Plain(path.to_owned())
        };
        Ok(Self { name, kind, routes: Vec::new() })
    }

    pub(crate) fn with_prefix(prefix: String, name: Option<String>) -> Self {
        Self { name, kind: ResourceKind::Static(prefix), routes: Vec::new() }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// The path, template or prefix this resource was registered with.
    pub fn path(&self) -> &str {
        match &self.kind {
            ResourceKind::Plain(path) | ResourceKind::Static(path) => path,
            ResourceKind::Dynamic(template) => template.as_str(),
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Registers `handler` for `method` (`*` for every method).
    ///
    /// A route that an earlier route of this resource would always shadow is
    /// rejected with [`RouterError::UnreachableRoute`].
    pub fn add_route(
        &mut self,
        method: &str,
        handler: Handler,
        expect_handler: Option<Arc<dyn ExpectHandler>>,
    ) -> Result<&Route, RouterError> {
        let method = method.parse::<RouteMethod>()?;
        self.check_reachable(&method)?;
        self.routes.push(Route::new(method, handler, expect_handler));
        Ok(&self.routes[self.routes.len() - 1])
    }

    fn check_reachable(&self, method: &RouteMethod) -> Result<(), RouterError> {
        if self.routes.iter().any(|route| route.method().covers(method)) {
            return Err(RouterError::UnreachableRoute { method: method.to_string() });
        }
        Ok(())
    }

    /// Matches `path`, returning the variables it captured.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        match &self.kind {
            ResourceKind::Plain(plain) => (plain == path).then(PathParams::empty),
            ResourceKind::Dynamic(template) => template.captures(path),
            ResourceKind::Static(prefix) => {
                let filename = path.strip_prefix(prefix.as_str())?;
                Some([("filename", filename)].into_iter().collect())
            }
        }
    }

    /// The route of this resource serving `method`, if any.
    pub fn route_for(&self, method: &http::Method) -> Option<&Route> {
        self.routes.iter().find(|route| route.method().matches(method))
    }

    /// Builds a url for this resource.
    ///
    /// Dynamic resources substitute `vars` into their template, static ones
    /// append the `filename` variable to the prefix. A non-empty `query` is
    /// form-encoded after `?`.
    pub fn url(&self, vars: &[(&str, &str)], query: &[(&str, &str)]) -> Result<String, RouterError> {
        let mut url = match &self.kind {
            ResourceKind::Plain(path) => path.clone(),
            ResourceKind::Dynamic(template) => template.format(vars)?,
            ResourceKind::Static(prefix) => {
                let filename = vars
                    .iter()
                    .find(|(name, _)| *name == "filename")
                    .map(|(_, value)| *value)
                    .ok_or_else(|| RouterError::missing_variable("filename"))?;
                format!("{prefix}{}", filename.trim_start_matches('/'))
            }
        };

        if !query.is_empty() {
            url.push('?');
            url.push_str(&serde_urlencoded::to_string(query)?);
        }
        Ok(url)
    }
}
