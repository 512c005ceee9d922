use crate::handler::{ContinueExpectHandler, ExpectHandler, Handler};
use crate::router::RouterError;
use http::Method;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The method a route answers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    /// `*`, every method
    Any,
    Exact(Method),
}

impl RouteMethod {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            RouteMethod::Any => true,
            RouteMethod::Exact(expected) => expected == method,
        }
    }

    /// Whether a request accepted by `other` would always be taken by `self` first.
    pub(crate) fn covers(&self, other: &RouteMethod) -> bool {
        match (self, other) {
            (RouteMethod::Any, _) => true,
            (RouteMethod::Exact(_), RouteMethod::Any) => false,
            (RouteMethod::Exact(a), RouteMethod::Exact(b)) => a == b,
        }
    }
}

impl FromStr for RouteMethod {
    type Err = RouterError;

    /// Accepts `*` and the methods routes may be registered for, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "*" => return Ok(RouteMethod::Any),
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            _ => return Err(RouterError::InvalidMethod { method: s.to_owned() }),
        };
        Ok(RouteMethod::Exact(method))
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        RouteMethod::Exact(method)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Any => f.write_str("*"),
            RouteMethod::Exact(method) => f.write_str(method.as_str()),
        }
    }
}

/// A handler bound to a method on a resource.
#[derive(Clone)]
pub struct Route {
    method: RouteMethod,
    handler: Handler,
    expect_handler: Arc<dyn ExpectHandler>,
}

impl Route {
    pub(crate) fn new(method: RouteMethod, handler: Handler, expect_handler: Option<Arc<dyn ExpectHandler>>) -> Self {
        Self { method, handler, expect_handler: expect_handler.unwrap_or_else(|| Arc::new(ContinueExpectHandler)) }
    }

    pub fn method(&self) -> &RouteMethod {
        &self.method
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn expect_handler(&self) -> &Arc<dyn ExpectHandler> {
        &self.expect_handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("method", &self.method).field("handler", &self.handler).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!("*".parse::<RouteMethod>().unwrap(), RouteMethod::Any);
        assert_eq!("get".parse::<RouteMethod>().unwrap(), RouteMethod::Exact(Method::GET));
        assert_eq!("OPTIONS".parse::<RouteMethod>().unwrap(), RouteMethod::Exact(Method::OPTIONS));
        assert!(matches!("TRACE".parse::<RouteMethod>(), Err(RouterError::InvalidMethod { method }) if method == "TRACE"));
        assert!("".parse::<RouteMethod>().is_err());
    }

    #[test]
    fn test_matches_and_covers() {
        let get = RouteMethod::Exact(Method::GET);
        assert!(get.matches(&Method::GET));
        assert!(!get.matches(&Method::POST));
        assert!(RouteMethod::Any.matches(&Method::DELETE));

        assert!(RouteMethod::Any.covers(&get));
        assert!(get.covers(&get));
        assert!(!get.covers(&RouteMethod::Any));
        assert!(!get.covers(&RouteMethod::Exact(Method::PUT)));
    }

    #[test]
    fn test_display() {
        assert_eq!(RouteMethod::Any.to_string(), "*");
        assert_eq!(RouteMethod::from(Method::PATCH).to_string(), "PATCH");
    }
}
