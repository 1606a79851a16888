//! Route table: per-method mapping from path prefix to handler, matched by
//! longest prefix.

use crate::connection::Connection;
use crate::http::Method;
use crate::prelude::*;

pub type HandlerFn = dyn Fn(&mut Connection) -> Result<()> + Send + Sync;

pub struct Route {
    pub method: Method,
    pub path_prefix: String,
    pub handler: Box<HandlerFn>,
}

/// Frozen after [`Dispatcher::lock`]; adding a route afterwards is a
/// programming error the caller must not trigger in practice (start-up
/// builds the whole table before `run()`).
pub struct Dispatcher {
    routes: Vec<Route>,
    locked: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            routes: Vec::new(),
            locked: false,
        }
    }

    pub fn add_route(&mut self, method: Method, path_prefix: &str, handler: Box<HandlerFn>) {
        assert!(!self.locked, "cannot add a route after the server has started");
        self.routes.push(Route {
            method,
            path_prefix: path_prefix.to_string(),
            handler,
        });
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Longest-prefix match among routes for the request's method; ties
    /// (equal prefix length) break by insertion order, the first-registered
    /// route wins.
    fn find(&self, method: &Method, path: &str) -> Option<&Route> {
        // `Iterator::max_by_key` keeps the *last* maximum on a tie, which
        // would make tie-break order depend on route registration order in
        // the wrong direction; fold explicitly so the first-registered
        // route wins instead.
        self.routes
            .iter()
            .filter(|r| &r.method == method && path.starts_with(r.path_prefix.as_str()))
            .fold(None::<&Route>, |best, candidate| match best {
                Some(b) if b.path_prefix.len() >= candidate.path_prefix.len() => Some(b),
                _ => Some(candidate),
            })
    }

    pub fn dispatch(&self, conn: &mut Connection) -> Result<()> {
        let method = conn.request.method.clone();
        let path = conn.request.path.clone();
        match self.find(&method, &path) {
            Some(route) => (route.handler)(conn),
            None => {
                conn.set_status(404, None);
                conn.set_buffered();
                conn.write(b"No handler available");
                Ok(())
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let mut d = Dispatcher::new();
        d.add_route(Method::Get, "/", Box::new(|c| {
            c.set_status(1, None);
            Ok(())
        }));
        d.add_route(Method::Get, "/api", Box::new(|c| {
            c.set_status(2, None);
            Ok(())
        }));
        d.lock();
        assert_eq!(d.find(&Method::Get, "/api/x").unwrap().path_prefix, "/api");
        assert_eq!(d.find(&Method::Get, "/other").unwrap().path_prefix, "/");
    }

    #[test]
    fn no_match_returns_none() {
        let mut d = Dispatcher::new();
        d.add_route(Method::Post, "/api", Box::new(|_| Ok(())));
        d.lock();
        assert!(d.find(&Method::Get, "/api").is_none());
    }
}
