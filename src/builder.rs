//! Building an application from views and modules.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use dime_core::{Binder, Injector, Module};
use http::Method;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::config::Config;
use crate::decorator::{Deferred, apply_all};
use crate::descriptor::{Declaration, View};
use crate::error::{ConfigError, Result};
use crate::inject::Inject;
use crate::request::{Params, Request};
use crate::route::{RouteOptions, axum_path};
use crate::view::{Handler, InjectorView, ViewFn};

/// The body limit used when the configuration has no `MAX_CONTENT_LENGTH`.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 2 * 1024 * 1024;

/// The application handle, bound in the injector as a singleton.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppInfo {
    name: Arc<str>,
}

impl AppInfo {
    /// Returns the package name given to [`Builder::package`].
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A route registered by [`Builder::build`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteInfo {
    pub endpoint: String,
    /// The rule as declared, with the class prefix if any.
    pub rule: String,
    /// The path registered on the router.
    pub path: String,
    pub methods: Vec<Method>,
}

/// Builds an [`App`] whose views have their dependencies injected.
///
/// Besides the bindings of its modules, the injector of the application holds:
///
/// - the [`AppInfo`] and the [`Config`] of the application, as singletons,
/// - the [`Request`] being served, as a request local.
///
/// ```
/// use dime_web::{Builder, FunctionView, Kwargs, route};
///
/// let app = Builder::new()
///     .view(FunctionView::new("bar", |_: Kwargs| async { "bar" }).route(route("/bar")))
///     .config_value("DEBUG", true)
///     .build()
///     .unwrap();
///
/// assert_eq!(app.routes()[0].path, "/bar");
/// assert!(app.config().is_debug());
/// ```
pub struct Builder {
    views: Vec<View>,
    modules: Vec<Box<dyn Module>>,
    config: Config,
    package: String,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            views: Vec::new(),
            modules: Vec::new(),
            config: Config::default(),
            package: "main".to_owned(),
        }
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("views", &self.views)
            .field("modules", &self.modules.len())
            .field("config", &self.config)
            .field("package", &self.package)
            .finish()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn view(mut self, view: impl Into<View>) -> Self {
        self.views.push(view.into());
        self
    }

    #[must_use]
    pub fn views<I>(mut self, views: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<View>,
    {
        self.views.extend(views.into_iter().map(Into::into));
        self
    }

    /// Adds a module. Modules are installed in the order they are added, after the bindings of
    /// the builder itself, so they can read the [`Config`] and replace earlier bindings.
    #[must_use]
    pub fn module<M>(mut self, module: M) -> Self
    where
        M: Module + 'static,
    {
        self.modules.push(Box::new(module));
        self
    }

    /// Merges `values` into the configuration.
    #[must_use]
    pub fn config<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.config.update(values);
        self
    }

    #[must_use]
    pub fn config_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key, value);
        self
    }

    /// Sets the name of the application, exposed through [`AppInfo`].
    #[must_use]
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Builds the injector and registers every view on a router.
    ///
    /// Request bodies are buffered up to `MAX_CONTENT_LENGTH` bytes of the configuration, or
    /// [`DEFAULT_MAX_CONTENT_LENGTH`] when it is not set; larger bodies get a
    /// `413 Payload Too Large`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a view is declared incorrectly, `MAX_CONTENT_LENGTH` is not
    /// a byte count, or a decorator cannot resolve its extension. Nothing is registered in that
    /// case.
    pub fn build(self) -> Result<App, ConfigError> {
        let planned = plan(&self.views)?;
        let body_limit = body_limit(&self.config)?;
        debug!(
            views = self.views.len(),
            routes = planned.len(),
            "validated views"
        );

        let info = AppInfo {
            name: Arc::from(self.package),
        };
        let mut binder = Binder::new();
        binder
            .bind_instance(info.clone())
            .bind_instance(self.config.clone())
            .bind_local::<Request>();
        for module in &self.modules {
            binder.install(module.as_ref());
        }
        for view in &self.views {
            if let View::Class(class) = view
                && !binder.is_bound_key(class.owner)
            {
                debug!(owner = class.owner.type_name(), "binding class view");
                (class.bind_owner)(&mut binder);
            }
        }
        let injector = Arc::new(binder.build());

        let mut method_routers: BTreeMap<String, MethodRouter> = BTreeMap::new();
        let mut routes = Vec::with_capacity(planned.len());
        for plan in planned {
            let view = InjectorView::new(
                plan.name.as_str(),
                plan.handler,
                plan.inject,
                Arc::clone(&injector),
            )
            .into_view_fn();
            let view = apply_all(&plan.decorators, &injector, view).map_err(|(key, source)| {
                ConfigError::Decorator {
                    view: plan.name.clone(),
                    extension: key.type_name(),
                    source,
                }
            })?;

            for filter in plan.filters {
                let view = view.clone();
                let handler = move |request: axum::extract::Request| {
                    serve(view.clone(), body_limit, request)
                };
                let method_router = match method_routers.remove(&plan.route.path) {
                    Some(method_router) => method_router.on(filter, handler),
                    None => axum::routing::on(filter, handler),
                };
                method_routers.insert(plan.route.path.clone(), method_router);
            }
            routes.push(plan.route);
        }

        let router = method_routers
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            });
        for route in &routes {
            info!(
                endpoint = %route.endpoint,
                path = %route.path,
                methods = ?route.methods,
                "registered route"
            );
        }

        Ok(App {
            router,
            injector,
            config: self.config,
            info,
            routes,
        })
    }
}

struct Planned {
    name: String,
    route: RouteInfo,
    filters: Vec<MethodFilter>,
    handler: Handler,
    inject: Inject,
    decorators: Vec<Deferred>,
}

/// Checks every view and works out its routes, before anything is bound or registered.
fn plan(views: &[View]) -> Result<Vec<Planned>, ConfigError> {
    let mut planned = Vec::new();
    for view in views {
        match view {
            View::Function(view) => {
                planned.push(plan_one(&view.0, "", &RouteOptions::default())?);
            }
            View::Class(class) => {
                let (prefix, defaults) = match &class.marker {
                    Some(marker) => (marker.prefix(&class.name)?, marker.options().clone()),
                    None => ("", RouteOptions::default()),
                };
                for method in &class.methods {
                    planned.push(plan_one(method, prefix, &defaults)?);
                }
            }
        }
    }

    let mut endpoints = BTreeSet::new();
    let mut registered = BTreeSet::new();
    let mut shapes = BTreeMap::new();
    for plan in &planned {
        let route = &plan.route;
        if !endpoints.insert(route.endpoint.as_str()) {
            return Err(ConfigError::DuplicateEndpoint {
                endpoint: route.endpoint.clone(),
            });
        }
        for method in &route.methods {
            if !registered.insert((route.path.as_str(), method.as_str())) {
                return Err(ConfigError::DuplicateRoute {
                    method: method.to_string(),
                    path: route.path.clone(),
                });
            }
        }
        let existing = shapes
            .entry(shape(&route.path))
            .or_insert(route.path.as_str());
        if *existing != route.path {
            return Err(ConfigError::PathConflict {
                path: route.path.clone(),
                existing: (*existing).to_owned(),
            });
        }
    }

    Ok(planned)
}

fn plan_one(
    declaration: &Declaration,
    prefix: &str,
    defaults: &RouteOptions,
) -> Result<Planned, ConfigError> {
    let name = &declaration.name;
    let marker = declaration
        .marker
        .as_ref()
        .ok_or_else(|| ConfigError::MissingRoute { view: name.clone() })?;
    let (rule, options) = marker.rule(name)?;
    let options = options.or(defaults);

    let rule = format!("{prefix}{rule}");
    let path = axum_path(&rule);
    if !is_valid_path(&path) {
        return Err(ConfigError::InvalidPath {
            view: name.clone(),
            path: rule,
        });
    }

    let methods = match options.methods {
        Some(methods) if !methods.is_empty() => methods,
        _ => vec![Method::GET],
    };
    let filters = methods
        .iter()
        .map(|method| {
            MethodFilter::try_from(method.clone()).map_err(|_| ConfigError::UnsupportedMethod {
                view: name.clone(),
                method: method.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Planned {
        name: name.clone(),
        route: RouteInfo {
            endpoint: options.endpoint.unwrap_or_else(|| name.clone()),
            rule,
            path,
            methods,
        },
        filters,
        handler: declaration.handler.clone(),
        inject: declaration.inject.clone(),
        decorators: declaration.decorators.clone(),
    })
}

/// Checks a translated path before it reaches the router, which panics on malformed captures.
///
/// A segment is either static text without braces or a single `{name}` capture; a `{*name}`
/// wildcard may only be the last segment. Capture names are unique.
fn is_valid_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;
    let mut names = BTreeSet::new();
    segments.iter().enumerate().all(|(index, segment)| {
        if segment.starts_with(':') || segment.starts_with('*') {
            return false;
        }
        if !segment.contains(['{', '}']) {
            return true;
        }
        let Some(capture) = segment
            .strip_prefix('{')
            .and_then(|capture| capture.strip_suffix('}'))
        else {
            return false;
        };
        let (name, wildcard) = match capture.strip_prefix('*') {
            Some(name) => (name, true),
            None => (capture, false),
        };
        !name.is_empty()
            && !name.contains(['{', '}', '*'])
            && (!wildcard || index == last)
            && names.insert(name)
    })
}

/// Reads `MAX_CONTENT_LENGTH` from `config`.
fn body_limit(config: &Config) -> Result<usize, ConfigError> {
    const KEY: &str = "MAX_CONTENT_LENGTH";
    match config.get(KEY) {
        None | Some(Value::Null) => Ok(DEFAULT_MAX_CONTENT_LENGTH),
        Some(value) => usize::deserialize(value).map_err(|source| ConfigError::InvalidSetting {
            key: KEY.to_owned(),
            source,
        }),
    }
}

/// The path with capture names erased; two paths of the same shape cannot share a router.
fn shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn serve(view: ViewFn, body_limit: usize, request: axum::extract::Request) -> Response {
    let (mut parts, body) = request.into_parts();
    let params: Params = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(raw) => raw
            .iter()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect(),
        // Routes without captures have no parameters to extract.
        Err(RawPathParamsRejection::MissingPathParams(_)) => Params::new(),
        Err(rejection) => {
            warn!(error = %rejection, path = %parts.uri.path(), "rejected route parameters");
            return rejection.into_response();
        }
    };

    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|len| len > body_limit) {
        return payload_too_large(body_limit);
    }
    let body = match Limited::new(body, body_limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            return payload_too_large(body_limit);
        }
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    view.call(Request::from_parts(parts, body), params).await
}

fn payload_too_large(limit: usize) -> Response {
    debug!(limit, "request body too large");
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("request body exceeds {limit} bytes"),
    )
        .into_response()
}

/// An application built by [`Builder`]: an [`axum::Router`] plus the injector its views use.
#[derive(Clone, Debug)]
pub struct App {
    router: Router,
    injector: Arc<Injector>,
    config: Config,
    info: AppInfo,
    routes: Vec<RouteInfo>,
}

impl App {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    pub const fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn info(&self) -> &AppInfo {
        &self.info
    }

    /// Returns the registered routes, in the order the views were declared.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// Serves the application on `addr` until Ctrl-C is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server fails.
    pub async fn run<A>(self, addr: A) -> crate::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(
            app = self.info.name(),
            addr = ?listener.local_addr().ok(),
            "listening"
        );
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!(app = self.info.name(), "stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, shutting down"),
        Err(err) => {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
