//! Scripted in-memory transport for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::conn::{ConnError, Transport};
use crate::frame::{HttpRequest, HttpResponse};

type Handler = Arc<dyn Fn(usize) -> Result<HttpResponse, ConnError> + Send + Sync>;

/// Answers requests by path. Each handler gets the zero-based call count for
/// its path. Unrouted paths return 404.
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, (Handler, usize)>>,
    log: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Install (or replace) the handler for `path`, e.g. `"/stats"`.
    pub(crate) fn route(
        &self,
        path: &str,
        f: impl Fn(usize) -> Result<HttpResponse, ConnError> + Send + Sync + 'static,
    ) {
        let handler: Handler = Arc::new(f);
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.insert(path.to_string(), (handler, 0));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Requests whose path is `path`, in issue order.
    pub(crate) fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.target().map(|t| t.path == path).unwrap_or(false))
            .collect()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ConnError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let path = request.target()?.path;
        // Handlers may block; call them outside the routes lock.
        let found = {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            routes.get_mut(&path).map(|(handler, calls)| {
                let n = *calls;
                *calls += 1;
                (Arc::clone(handler), n)
            })
        };
        match found {
            Some((handler, n)) => handler(n),
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}
