//! Dependency injection for axum views.
//!
//! Views declare the dependencies they need with [`Inject`]; a [`Builder`] wires them to a
//! [`dime_core`] injector and registers them on an [`axum::Router`]. Every request is served in
//! its own [`RequestScope`], which is reset as soon as the view is done.
//!
//! ```no_run
//! use dime_web::{Builder, Config, FunctionView, Inject, Kwargs, route};
//! use dime_web::dime_core::{Binder, Resolver, Scope};
//!
//! #[derive(Clone)]
//! struct Database(String);
//!
//! # async fn run() -> dime_web::Result<()> {
//! let foo = FunctionView::new("foo", |kwargs: Kwargs| async move {
//!     let db = kwargs.get::<Database>("db")?;
//!     Ok::<_, dime_web::Error>(format!("connected to {}", db.0))
//! })
//! .route(route("/foo"))
//! .inject(Inject::new().with::<Database>("db"));
//!
//! let app = Builder::new()
//!     .view(foo)
//!     .module(|binder: &mut Binder| {
//!         binder.bind_provider(Scope::Request, |resolver: &Resolver<'_>| {
//!             let config = resolver.get::<Config>()?;
//!             Ok(Database(config.get_as("DB_CONNECTION_STRING")?))
//!         });
//!     })
//!     .config_value("DB_CONNECTION_STRING", ":memory:")
//!     .build()?;
//!
//! app.run("127.0.0.1:5000").await
//! # }
//! ```
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
pub(crate) mod macros;

pub mod builder;
pub mod config;
pub mod decorator;
pub mod descriptor;
pub mod error;
pub mod inject;
pub mod kwargs;
pub mod request;
pub mod route;
pub mod view;

pub use builder::{App, AppInfo, Builder, RouteInfo};
pub use config::Config;
pub use decorator::{Decorator, Deferred};
pub use descriptor::{ClassView, FunctionView, MethodView, View};
pub use error::{ConfigError, Error, Result};
pub use inject::Inject;
pub use kwargs::Kwargs;
pub use request::{Params, Request};
pub use route::{RouteMarker, RouteOptions, route};
pub use view::{Handler, InjectorView, ViewFn, ViewFuture};

pub use dime_core;
pub use dime_core::{Binder, Injectable, Injector, Module, RequestScope, Resolver, Scope};
