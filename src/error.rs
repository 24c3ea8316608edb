//! Error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A mistake in the declaration of views, found while building the application.
///
/// [`Builder::build`](crate::builder::Builder::build) returns these before any route is
/// registered.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(
        "class view `{owner}` takes exactly one positional route argument (the path prefix), got {count}"
    )]
    ClassPrefix { owner: String, count: usize },

    #[error("view `{view}` has no route")]
    MissingRoute { view: String },

    #[error(
        "route of view `{view}` takes a path and an optional endpoint as positional arguments, got {count}"
    )]
    RouteArguments { view: String, count: usize },

    #[error("view `{view}` sets its endpoint both positionally and as an option")]
    EndpointConflict { view: String },

    #[error(
        "route `{path}` of view `{view}` must start with `/` and hold at most one named capture per segment"
    )]
    InvalidPath { view: String, path: String },

    #[error("view `{view}` cannot be routed on method `{method}`")]
    UnsupportedMethod { view: String, method: String },

    #[error("endpoint `{endpoint}` is registered more than once")]
    DuplicateEndpoint { endpoint: String },

    #[error("`{method} {path}` is registered more than once")]
    DuplicateRoute { method: String, path: String },

    #[error("route `{path}` conflicts with route `{existing}`")]
    PathConflict { path: String, existing: String },

    #[error("configuration key `{key}` has an unexpected value")]
    InvalidSetting {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to apply a `{extension}` decorator to view `{view}`")]
    Decorator {
        view: String,
        extension: &'static str,
        #[source]
        source: dime_core::Error,
    },
}

/// [`Error`] is an error that can be raised by functions and methods from this library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to resolve dependency: {0}")]
    Resolution(#[from] dime_core::Error),

    #[error("missing argument `{0}`")]
    MissingArgument(String),

    #[error("argument `{name}` is not a `{expected}`")]
    ArgumentType { name: String, expected: &'static str },

    #[error("missing configuration key `{0}`")]
    MissingSetting(String),

    #[error("configuration key `{key}` has an unexpected value")]
    InvalidSetting {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

// Lets providers use `?` on errors of this crate, e.g. when reading a configuration value.
impl From<Error> for dime_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Resolution(inner) => inner,
            other => Self::other(other),
        }
    }
}

/// [`Result`] is an alias to [`core::result::Result`] with [`Error`] as the
/// default error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
