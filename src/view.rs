//! Dispatching requests to injected handlers.
//!
//! An [`InjectorView`] wraps a handler so that, for every request, it opens a [`RequestScope`],
//! resolves the handler's owner and declared dependencies, calls the handler, and resets the
//! scope once the handler is done.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use dime_core::{Injector, Key, RequestScope, Resolver};

use crate::error::Error;
use crate::inject::Inject;
use crate::kwargs::Kwargs;
use crate::request::{Params, Request};

/// The future returned by a view.
pub type ViewFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, cloneable view: the unit decorators wrap and routes call.
#[derive(Clone)]
pub struct ViewFn(Arc<dyn Fn(Request, Params) -> ViewFuture + Send + Sync>);

impl ViewFn {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoResponse,
    {
        Self(Arc::new(move |request, params| {
            let fut = f(request, params);
            Box::pin(async move { fut.await.into_response() })
        }))
    }

    pub fn call(&self, request: Request, params: Params) -> ViewFuture {
        (self.0)(request, params)
    }
}

impl std::fmt::Debug for ViewFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewFn").finish_non_exhaustive()
    }
}

type BoundHandler = Box<dyn FnOnce(Kwargs) -> ViewFuture + Send>;

type BindFn = Arc<dyn Fn(&Resolver<'_>) -> dime_core::Result<BoundHandler> + Send + Sync>;

/// A handler whose owner, if any, is resolved for every call.
#[derive(Clone)]
pub struct Handler {
    owner: Option<Key>,
    bind: BindFn,
}

impl Handler {
    /// A free function taking its arguments by name.
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoResponse,
    {
        let f = Arc::new(f);
        Self {
            owner: None,
            bind: Arc::new(move |_: &Resolver<'_>| -> dime_core::Result<BoundHandler> {
                let f = Arc::clone(&f);
                Ok(Box::new(move |kwargs: Kwargs| {
                    let fut = f(kwargs);
                    Box::pin(async move { fut.await.into_response() }) as ViewFuture
                }) as BoundHandler)
            }),
        }
    }

    /// A method of `C`. The receiver is resolved from the injector on every call.
    pub fn method<C, F, Fut>(f: F) -> Self
    where
        C: Clone + Send + Sync + 'static,
        F: Fn(C, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoResponse,
    {
        let f = Arc::new(f);
        Self {
            owner: Some(Key::of::<C>()),
            bind: Arc::new(move |resolver: &Resolver<'_>| -> dime_core::Result<BoundHandler> {
                let owner = resolver.get::<C>()?;
                let f = Arc::clone(&f);
                Ok(Box::new(move |kwargs: Kwargs| {
                    let fut = f(owner, kwargs);
                    Box::pin(async move { fut.await.into_response() }) as ViewFuture
                }) as BoundHandler)
            }),
        }
    }

    /// Returns the key of the owning type of a method handler.
    pub const fn owner(&self) -> Option<Key> {
        self.owner
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// A handler wired to an injector.
#[derive(Clone, Debug)]
pub struct InjectorView {
    name: Arc<str>,
    handler: Handler,
    inject: Arc<Inject>,
    injector: Arc<Injector>,
}

impl InjectorView {
    pub fn new(
        name: impl Into<Arc<str>>,
        handler: Handler,
        inject: Inject,
        injector: Arc<Injector>,
    ) -> Self {
        Self {
            name: name.into(),
            handler,
            inject: Arc::new(inject),
            injector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serves `request` in a scope of its own.
    pub async fn dispatch(&self, request: Request, params: Params) -> Response {
        let scope = RequestScope::new();
        self.dispatch_in(&scope, request, params).await
    }

    /// Serves `request` in `scope`, which is reset before this returns, and also if the handler
    /// panics or the returned future is dropped.
    ///
    /// Failing to resolve the owner or a dependency yields a `500 Internal Server Error`
    /// response.
    pub async fn dispatch_in(&self, scope: &RequestScope, request: Request, params: Params) -> Response {
        let _reset = scope.guard();
        trace!(view = %self.name, path = request.path(), "dispatching");
        scope.provide(request);

        match self.prepare(scope, params) {
            Ok(call) => call.await,
            Err(err) => {
                error!(view = %self.name, error = %err, "failed to resolve view dependencies");
                Error::Resolution(err).into_response()
            }
        }
    }

    /// Binds the handler and resolves its arguments. Nothing is awaited, so the resolver does not
    /// outlive this call.
    fn prepare(&self, scope: &RequestScope, params: Params) -> dime_core::Result<ViewFuture> {
        let resolver = self.injector.resolver(Some(scope));
        let handler = (self.handler.bind)(&resolver)?;
        let kwargs = if self.inject.is_empty() {
            Kwargs::from_params(params)
        } else {
            Kwargs::merge(self.inject.resolve(&resolver)?, params)
        };
        Ok(handler(kwargs))
    }

    /// Turns the view into a [`ViewFn`] that dispatches every call in a fresh scope.
    pub fn into_view_fn(self) -> ViewFn {
        ViewFn::new(move |request, params| {
            let view = self.clone();
            async move { view.dispatch(request, params).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::body::to_bytes;
    use axum::http::{Method, StatusCode};
    use dime_core::{Binder, Injectable, Scope};

    use super::*;

    #[derive(Clone, Debug)]
    struct Database(Arc<usize>);

    fn injector(connections: &Arc<AtomicUsize>) -> Arc<Injector> {
        let connections = Arc::clone(connections);
        let mut binder = Binder::new();
        binder
            .bind_local::<Request>()
            .bind_provider(Scope::Request, move |_: &Resolver<'_>| {
                Ok(Database(Arc::new(connections.fetch_add(1, Ordering::SeqCst))))
            });
        Arc::new(binder.build())
    }

    fn request() -> Request {
        Request::new(Method::GET, "/foo".parse().unwrap())
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    async fn text(response: Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_no_dependencies_receive_params_only() {
        let view = InjectorView::new(
            "echo",
            Handler::function(|kwargs: Kwargs| async move {
                kwargs.names().collect::<Vec<_>>().join(",")
            }),
            Inject::new(),
            injector(&Arc::default()),
        );

        let response = view.dispatch(request(), params(&[("a", "1"), ("b", "2")])).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "a,b");
    }

    #[tokio::test]
    async fn test_route_parameter_takes_precedence() {
        let view = InjectorView::new(
            "foo",
            Handler::function(|kwargs: Kwargs| async move {
                kwargs.param("db").unwrap_or("injected").to_owned()
            }),
            Inject::new().with::<Database>("db"),
            injector(&Arc::default()),
        );

        let response = view.dispatch(request(), params(&[("db", "route")])).await;
        assert_eq!(text(response).await, "route");
    }

    #[tokio::test]
    async fn test_dependencies_are_resolved_once_per_request() {
        let connections = Arc::new(AtomicUsize::new(0));
        let view = InjectorView::new(
            "foo",
            Handler::function(|kwargs: Kwargs| async move {
                let a = kwargs.get::<Database>("a").unwrap();
                let b = kwargs.get::<Database>("b").unwrap();
                assert!(Arc::ptr_eq(&a.0, &b.0));
                format!("db {}", a.0)
            }),
            Inject::new().with::<Database>("a").with::<Database>("b"),
            injector(&connections),
        );

        assert_eq!(text(view.dispatch(request(), Params::new()).await).await, "db 0");
        assert_eq!(text(view.dispatch(request(), Params::new()).await).await, "db 1");
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scope_is_empty_between_requests() {
        let view = InjectorView::new(
            "foo",
            Handler::function(|kwargs: Kwargs| async move {
                let request = kwargs.get::<Request>("request").unwrap();
                request.path().to_owned()
            }),
            Inject::new()
                .with::<Database>("db")
                .with::<Request>("request"),
            injector(&Arc::default()),
        );

        let scope = RequestScope::new();
        for _ in 0..2 {
            assert!(scope.is_empty());
            let response = view.dispatch_in(&scope, request(), Params::new()).await;
            assert_eq!(text(response).await, "/foo");
            assert!(scope.is_empty());
            assert!(scope.local::<Request>().is_none());
        }
    }

    #[tokio::test]
    async fn test_scope_is_reset_when_handler_fails() {
        let view = InjectorView::new(
            "fails",
            Handler::function(|kwargs: Kwargs| async move {
                kwargs.get::<u32>("missing").map(|n| n.to_string())
            }),
            Inject::new().with::<Database>("db"),
            injector(&Arc::default()),
        );

        let scope = RequestScope::new();
        let response = view.dispatch_in(&scope, request(), Params::new()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(scope.is_empty());
    }

    #[tokio::test]
    async fn test_resolution_failure_is_an_error_response() {
        #[derive(Clone)]
        struct Unbound;

        let view = InjectorView::new(
            "foo",
            Handler::function(|_: Kwargs| async { "unreachable" }),
            Inject::new()
                .with::<Database>("db")
                .with::<Unbound>("unbound"),
            injector(&Arc::default()),
        );

        let scope = RequestScope::new();
        let response = view.dispatch_in(&scope, request(), Params::new()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(text(response).await.contains("not bound"));
        assert!(scope.is_empty());
    }

    #[tokio::test]
    async fn test_scope_is_reset_when_handler_panics() {
        let view = InjectorView::new(
            "panics",
            Handler::function(|_: Kwargs| async {
                if std::hint::black_box(true) {
                    panic!("handler panicked");
                }
                "unreachable"
            }),
            Inject::new().with::<Database>("db"),
            injector(&Arc::default()),
        );

        let scope = Arc::new(RequestScope::new());
        let task = tokio::spawn({
            let scope = Arc::clone(&scope);
            async move { view.dispatch_in(&scope, request(), Params::new()).await }
        });

        assert!(task.await.unwrap_err().is_panic());
        assert!(scope.is_empty());
        assert!(scope.local::<Request>().is_none());
    }

    #[tokio::test]
    async fn test_scope_is_reset_when_dispatch_is_cancelled() {
        let view = InjectorView::new(
            "hangs",
            Handler::function(|_: Kwargs| std::future::pending::<&'static str>()),
            Inject::new().with::<Database>("db"),
            injector(&Arc::default()),
        );

        let scope = RequestScope::new();
        let dispatch = view.dispatch_in(&scope, request(), Params::new());
        let result = tokio::time::timeout(Duration::from_millis(10), dispatch).await;
        assert!(result.is_err());
        assert!(scope.is_empty());
    }

    #[tokio::test]
    async fn test_method_handler_is_bound_to_resolved_owner() {
        #[derive(Clone)]
        struct Waz {
            db: Database,
        }

        impl Injectable for Waz {
            fn inject(resolver: &Resolver<'_>) -> dime_core::Result<Self> {
                Ok(Self {
                    db: resolver.get()?,
                })
            }
        }

        let mut binder = Binder::new();
        binder
            .bind_local::<Request>()
            .bind_injectable::<Waz>(Scope::NoScope)
            .bind_provider(Scope::Request, |_: &Resolver<'_>| {
                Ok(Database(Arc::new(42)))
            });

        let handler = Handler::method(|waz: Waz, kwargs: Kwargs| async move {
            let db = kwargs.get::<Database>("db").unwrap();
            assert!(Arc::ptr_eq(&waz.db.0, &db.0));
            format!("waz {}", waz.db.0)
        });
        assert_eq!(handler.owner(), Some(Key::of::<Waz>()));

        let view = InjectorView::new(
            "waz",
            handler,
            Inject::new().with::<Database>("db"),
            Arc::new(binder.build()),
        );

        assert_eq!(text(view.dispatch(request(), Params::new()).await).await, "waz 42");
    }

    #[tokio::test]
    async fn test_into_view_fn() {
        let view = InjectorView::new(
            "id",
            Handler::function(|kwargs: Kwargs| async move {
                kwargs.param("id").unwrap_or_default().to_owned()
            }),
            Inject::new(),
            injector(&Arc::default()),
        )
        .into_view_fn();

        let response = view.call(request(), params(&[("id", "7")])).await;
        assert_eq!(text(response).await, "7");
    }
}
