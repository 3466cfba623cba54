use std::sync::Arc;
use std::time::Instant;

use crate::error::ServeError;
use crate::http::{Request, Response};
use crate::log_error;

/// What a handler did with the request.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Outcome {
    /// Handled; later matching handlers may still post-process the response.
    Continue,
    /// Handled; the response is final.
    Complete,
    /// Not handled. The response is left untouched for the next handler.
    Ignore,
}

pub trait Handler: Send + Sync {
    fn handle(&self, request: &Request, response: &mut Response) -> Result<Outcome, ServeError>;
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut Response) -> Result<Outcome, ServeError> + Send + Sync,
{
    fn handle(&self, request: &Request, response: &mut Response) -> Result<Outcome, ServeError> {
        self(request, response)
    }
}

/// Pins a closure to the handler signature so its argument and error
/// types are inferred.
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&Request, &mut Response) -> Result<Outcome, ServeError> + Send + Sync,
{
    f
}

struct Route {
    method: Option<String>,
    prefix: String,
    handler: Arc<dyn Handler>,
}

impl Route {
    fn matches(&self, request: &Request) -> bool {
        let method_ok = self
            .method
            .as_deref()
            .map_or(true, |m| m.eq_ignore_ascii_case(&request.method));
        method_ok && path_matches(&self.prefix, request.path())
    }
}

/// `/static` matches `/static` and `/static/...` but not `/staticfoo`.
fn path_matches(prefix: &str, path: &str) -> bool {
    strip_path_prefix(prefix, path).is_some()
}

/// Removes `prefix` from `target` when it ends on a segment boundary: the
/// end of the target, a `/`, or the start of a query or fragment.
pub(crate) fn strip_path_prefix<'a>(prefix: &str, target: &'a str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    let rest = target.strip_prefix(prefix)?;
    if prefix.is_empty() || rest.is_empty() || rest.starts_with(['/', '?', '#']) {
        Some(rest)
    } else {
        None
    }
}

/// Ordered handler chain. Every route matching method and path prefix runs
/// in registration order until one completes.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// `method` of `"*"` matches any method.
    pub fn route<H: Handler + 'static>(self, method: &str, prefix: &str, handler: H) -> Self {
        self.route_shared(method, prefix, Arc::new(handler))
    }

    pub fn route_shared(mut self, method: &str, prefix: &str, handler: Arc<dyn Handler>) -> Self {
        log::debug!("Registering route {} {}", method, prefix);
        self.routes.push(Route {
            method: (method != "*").then(|| method.to_string()),
            prefix: prefix.to_string(),
            handler,
        });
        self
    }

    pub fn dispatch(&self, request: &Request) -> Response {
        let start_time = Instant::now();
        let mut response = Response::default();
        let mut claimed = false;

        for route in self.routes.iter().filter(|r| r.matches(request)) {
            match route.handler.handle(request, &mut response) {
                Ok(Outcome::Continue) => claimed = true,
                Ok(Outcome::Complete) => {
                    claimed = true;
                    break;
                }
                Ok(Outcome::Ignore) => {}
                Err(e) => {
                    log_error!(e, format!("Handler for {} {} failed", request.method, request.target));
                    response.reset(500);
                    return response;
                }
            }
        }

        if !claimed {
            log::debug!("No handler claimed {}", request.target);
            response.reset(404);
        }

        log::debug!(
            "Dispatched {} {} in {:?}",
            request.method,
            request.target,
            start_time.elapsed()
        );
        response
    }
}
