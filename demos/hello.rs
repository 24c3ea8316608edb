//! Function and class views with injected dependencies.
//!
//! Run with `cargo run --example hello`, then try `curl localhost:5000/foo`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::{IntoResponse, Response};
use dime_web::dime_core::{Binder, Injectable, Resolver, Scope};
use dime_web::{
    Builder, ClassView, Config, Decorator, FunctionView, Inject, Kwargs, MethodView, ViewFn,
    route,
};
use tracing_subscriber::EnvFilter;

/// Stands in for a real connection; one is opened per request.
#[derive(Clone, Debug)]
struct Connection {
    address: String,
    id: usize,
}

/// Caches response bodies by path.
#[derive(Clone, Default)]
struct Cache(Arc<Mutex<HashMap<String, String>>>);

impl Cache {
    fn cached(&self, timeout: u64, view: ViewFn) -> ViewFn {
        let cache = self.clone();
        ViewFn::new(move |request, params| {
            let key = request.path().to_owned();
            let hit = cache.0.lock().ok().and_then(|entries| entries.get(&key).cloned());
            let inner = view.call(request, params);
            let cache = cache.clone();
            async move {
                if let Some(body) = hit {
                    tracing::debug!(%key, timeout, "cache hit");
                    return body.into_response();
                }
                let response = inner.await;
                let (parts, body) = response.into_parts();
                let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
                    return Response::from_parts(parts, axum::body::Body::empty());
                };
                if let (Ok(text), Ok(mut entries)) = (std::str::from_utf8(&bytes), cache.0.lock()) {
                    entries.insert(key, text.to_owned());
                }
                Response::from_parts(parts, axum::body::Body::from(bytes))
            }
        })
    }
}

#[derive(Clone)]
struct Waz {
    db: Connection,
}

impl Injectable for Waz {
    fn inject(resolver: &Resolver<'_>) -> dime_web::dime_core::Result<Self> {
        Ok(Self {
            db: resolver.get()?,
        })
    }
}

fn configure(binder: &mut Binder) {
    let connections = Arc::new(AtomicUsize::new(0));
    binder
        .bind_instance(Cache::default())
        .bind_provider(Scope::Request, move |resolver: &Resolver<'_>| {
            let config = resolver.get::<Config>()?;
            Ok(Connection {
                address: config.get_as("DB_CONNECTION_STRING")?,
                id: connections.fetch_add(1, Ordering::SeqCst),
            })
        });
}

#[tokio::main]
async fn main() -> dime_web::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cached = Decorator::new(Cache::cached);

    let foo = FunctionView::new("foo", |kwargs: Kwargs| async move {
        let db = kwargs.get::<Connection>("db")?;
        Ok::<_, dime_web::Error>(format!("foo: connection {} to {}", db.id, db.address))
    })
    .route(route("/foo"))
    .inject(Inject::new().with::<Connection>("db"));

    let bar = FunctionView::new("bar", |_: Kwargs| async { "bar" })
        .route(route("/bar"))
        .decorate(cached.call(30));

    let waz = ClassView::<Waz>::new("Waz")
        .route(route("/waz"))
        .method(
            MethodView::new("waz", |waz: Waz, _: Kwargs| async move {
                format!("waz: connection {}", waz.db.id)
            })
            .route(route("/waz")),
        )
        .method(
            MethodView::new("item", |_: Waz, kwargs: Kwargs| async move {
                format!("item {}", kwargs.param("id").unwrap_or_default())
            })
            .route(route("/items/<int:id>")),
        );

    let app = Builder::new()
        .view(foo)
        .view(bar)
        .view(waz)
        .module(configure)
        .config_value("DB_CONNECTION_STRING", ":memory:")
        .config(Config::from_prefixed_env("HELLO"))
        .package("hello")
        .build()?;

    for route in app.routes() {
        tracing::info!(endpoint = %route.endpoint, rule = %route.rule, "route");
    }

    app.run("127.0.0.1:5000").await
}
