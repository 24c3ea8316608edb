//! Route markers attached to views.

use http::Method;

use crate::error::ConfigError;

/// Routing options of a marker, applied when the route is registered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteOptions {
    /// Methods the route answers to. Defaults to `GET`.
    pub methods: Option<Vec<Method>>,
    /// Name of the route. Defaults to the name of the view.
    pub endpoint: Option<String>,
}

impl RouteOptions {
    /// Returns `self` with every unset option taken from `base`.
    pub fn or(&self, base: &Self) -> Self {
        Self {
            methods: self.methods.clone().or_else(|| base.methods.clone()),
            endpoint: self.endpoint.clone().or_else(|| base.endpoint.clone()),
        }
    }
}

/// Declares where a view is mounted.
///
/// On a function or a method, the positional arguments are the path rule and, optionally, the
/// endpoint name. On a class view, the single positional argument is the prefix of every method
/// path.
///
/// ```
/// use dime_web::route::route;
/// use http::Method;
///
/// let marker = route("/users/<int:id>").methods([Method::GET, Method::DELETE]);
/// assert_eq!(marker.args(), ["/users/<int:id>"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMarker {
    args: Vec<String>,
    options: RouteOptions,
}

/// Creates a marker for `path`.
pub fn route(path: impl Into<String>) -> RouteMarker {
    RouteMarker::positional([path])
}

impl RouteMarker {
    /// Creates a marker from raw positional arguments.
    ///
    /// The arguments are only checked when the application is built.
    pub fn positional<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            options: RouteOptions::default(),
        }
    }

    #[must_use]
    pub fn methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.options.methods = Some(methods.into_iter().collect());
        self
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.options.endpoint = Some(endpoint.into());
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub const fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Returns the path prefix of a class-level marker.
    pub(crate) fn prefix(&self, owner: &str) -> Result<&str, ConfigError> {
        match self.args.as_slice() {
            [prefix] => Ok(prefix),
            args => Err(ConfigError::ClassPrefix {
                owner: owner.to_owned(),
                count: args.len(),
            }),
        }
    }

    /// Splits the positional arguments of a function or method marker into the path rule and
    /// the options, moving a positional endpoint into the options.
    pub(crate) fn rule(&self, view: &str) -> Result<(&str, RouteOptions), ConfigError> {
        let mut options = self.options.clone();
        match self.args.as_slice() {
            [path] => Ok((path, options)),
            [path, endpoint] => {
                if options.endpoint.is_some() {
                    return Err(ConfigError::EndpointConflict {
                        view: view.to_owned(),
                    });
                }
                options.endpoint = Some(endpoint.clone());
                Ok((path, options))
            }
            args => Err(ConfigError::RouteArguments {
                view: view.to_owned(),
                count: args.len(),
            }),
        }
    }
}

/// Translates `<name>` and `<converter:name>` placeholders into axum `{name}` captures.
///
/// Rules already written with `{name}` captures are returned unchanged.
pub(crate) fn axum_path(rule: &str) -> String {
    let mut path = String::with_capacity(rule.len());
    let mut rest = rule;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let placeholder = &rest[start + 1..start + len];
        let name = placeholder
            .rsplit_once(':')
            .map_or(placeholder, |(_, name)| name);
        path.push_str(&rest[..start]);
        path.push('{');
        path.push_str(name);
        path.push('}');
        rest = &rest[start + len + 1..];
    }
    path.push_str(rest);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_defaults() {
        let marker = route("/foo");
        assert_eq!(marker.args(), ["/foo"]);
        assert_eq!(marker.options(), &RouteOptions::default());
    }

    #[test]
    fn test_options_override_base() {
        let base = RouteOptions {
            methods: Some(vec![Method::POST]),
            endpoint: Some("class".to_owned()),
        };
        let method = route("/x").methods([Method::PUT]);

        let merged = method.options().or(&base);
        assert_eq!(merged.methods, Some(vec![Method::PUT]));
        assert_eq!(merged.endpoint.as_deref(), Some("class"));

        let merged = RouteOptions::default().or(&base);
        assert_eq!(merged, base);
    }

    #[test]
    fn test_class_prefix_takes_exactly_one_argument() {
        assert_eq!(route("/waz").prefix("Waz").unwrap(), "/waz");

        let err = RouteMarker::positional(["/waz", "/other"])
            .prefix("Waz")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ClassPrefix { count: 2, .. }));

        let err = RouteMarker::positional(Vec::<String>::new())
            .prefix("Waz")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ClassPrefix { count: 0, .. }));
    }

    #[test]
    fn test_rule_with_positional_endpoint() {
        let marker = RouteMarker::positional(["/foo", "foo_view"]);
        let (path, options) = marker.rule("foo").unwrap();
        assert_eq!(path, "/foo");
        assert_eq!(options.endpoint.as_deref(), Some("foo_view"));

        let err = RouteMarker::positional(["/foo", "a"])
            .endpoint("b")
            .rule("foo")
            .unwrap_err();
        assert!(matches!(err, ConfigError::EndpointConflict { .. }));

        let err = RouteMarker::positional(["/foo", "a", "b"])
            .rule("foo")
            .unwrap_err();
        assert!(matches!(err, ConfigError::RouteArguments { count: 3, .. }));
    }

    #[test]
    fn test_axum_path() {
        assert_eq!(axum_path("/foo"), "/foo");
        assert_eq!(axum_path("/users/<id>"), "/users/{id}");
        assert_eq!(axum_path("/users/<int:id>/posts/<slug>"), "/users/{id}/posts/{slug}");
        assert_eq!(axum_path("/users/{id}"), "/users/{id}");
        assert_eq!(axum_path("/broken/<id"), "/broken/<id");
    }
}
