//! Action/room route table for application middleware.
//!
//! Host code registers extra middleware for enter, leave and event routes.
//! For each inbound control message the dispatcher calls [`Router::run`],
//! which executes every matching middleware in registration order. An error
//! from any middleware aborts the rest of the pipeline.

pub mod pattern;

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::context::MessageContext;
use crate::domain::Action;
use crate::error::RoomError;

pub use pattern::RoutePattern;

/// Asynchronous message middleware.
///
/// Returning an error vetoes the message: for enter/leave the registry is
/// not touched and no reply is sent.
pub trait Middleware: Send + Sync {
    /// Handles one message.
    fn call<'a>(&'a self, ctx: &'a mut MessageContext) -> BoxFuture<'a, Result<(), RoomError>>;
}

/// Closure-backed [`Middleware`], built with [`from_fn`].
pub struct FnMiddleware<F>(F);

/// Wraps a closure as middleware.
///
/// ```ignore
/// let mw = from_fn(|ctx| Box::pin(async move {
///     ctx.payload = serde_json::json!("seen");
///     Ok(())
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'c> Fn(&'c mut MessageContext) -> BoxFuture<'c, Result<(), RoomError>> + Send + Sync,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'c> Fn(&'c mut MessageContext) -> BoxFuture<'c, Result<(), RoomError>> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a mut MessageContext) -> BoxFuture<'a, Result<(), RoomError>> {
        (self.0)(ctx)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMiddleware")
    }
}

struct Route {
    action: Action,
    pattern: RoutePattern,
    middleware: Arc<dyn Middleware>,
}

/// Ordered table of `(action, pattern, middleware)` routes.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `middleware` for `action` on rooms matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidPattern`] if `pattern` does not parse.
    pub fn route(
        &mut self,
        action: Action,
        pattern: &str,
        middleware: Arc<dyn Middleware>,
    ) -> Result<&mut Self, RoomError> {
        let pattern = RoutePattern::parse(pattern)?;
        debug!(%action, %pattern, "route registered");
        self.routes.push(Route {
            action,
            pattern,
            middleware,
        });
        Ok(self)
    }

    /// Runs every middleware registered for `action` whose pattern matches
    /// `room`, in registration order.
    ///
    /// Returns how many middleware ran.
    ///
    /// # Errors
    ///
    /// Propagates the first middleware error; later middleware do not run.
    pub async fn run(
        &self,
        action: Action,
        room: &str,
        ctx: &mut MessageContext,
    ) -> Result<usize, RoomError> {
        let mut ran = 0;
        for route in self.routes.iter().filter(|r| r.action == action) {
            let Some(capture) = route.pattern.matches(room) else {
                continue;
            };
            if let Some((name, value)) = capture {
                ctx.params.insert(name.to_string(), value);
            }
            route.middleware.call(ctx).await?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.routes
                    .iter()
                    .map(|r| format!("{} {}", r.action, r.pattern)),
            )
            .finish()
    }
}
