//! Named arguments handed to handlers.

use std::collections::BTreeMap;

use dime_core::Erased;

use crate::error::{Error, Result};
use crate::request::Params;

/// The arguments of one handler invocation, by name.
///
/// Injected dependencies and route parameters share one namespace. Route parameters are
/// `String`s; injected values keep the type they were bound with.
#[derive(Clone, Debug, Default)]
pub struct Kwargs {
    values: BTreeMap<String, Erased>,
}

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments made of the route parameters alone.
    pub fn from_params(params: Params) -> Self {
        Self {
            values: params
                .into_iter()
                .map(|(name, value)| (name, Erased::new(value)))
                .collect(),
        }
    }

    /// Merges injected values with route parameters.
    ///
    /// When a name is both injected and captured from the path, the route parameter wins.
    pub fn merge<I>(injected: I, params: Params) -> Self
    where
        I: IntoIterator<Item = (String, Erased)>,
    {
        let mut values: BTreeMap<_, _> = injected.into_iter().collect();
        for (name, value) in params {
            if values.insert(name, Erased::new(value)).is_some() {
                trace!("route parameter shadows an injected value");
            }
        }
        Self { values }
    }

    pub fn insert<T>(&mut self, name: impl Into<String>, value: T) -> Option<Erased>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values.insert(name.into(), Erased::new(value))
    }

    /// Returns a clone of the argument `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingArgument`] if there is no such argument, and
    /// [`Error::ArgumentType`] if it is not a `T`.
    pub fn get<T>(&self, name: &str) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| Error::MissingArgument(name.to_owned()))?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| Error::ArgumentType {
                name: name.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Returns the argument `name` if it is a string, which route parameters always are.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|value| value.downcast_ref::<String>())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Database(&'static str);

    #[test]
    fn test_from_params() {
        let kwargs = Kwargs::from_params(params(&[("id", "7")]));
        assert_eq!(kwargs.len(), 1);
        assert_eq!(kwargs.param("id"), Some("7"));
        assert_eq!(kwargs.get::<String>("id").unwrap(), "7");
    }

    #[test]
    fn test_route_parameter_wins() {
        let injected = vec![
            ("db".to_owned(), Erased::new(Database("injected"))),
            ("other".to_owned(), Erased::new(Database("other"))),
        ];
        let kwargs = Kwargs::merge(injected, params(&[("db", "from-route")]));

        assert_eq!(kwargs.len(), 2);
        assert_eq!(kwargs.param("db"), Some("from-route"));
        assert_eq!(kwargs.get::<Database>("other").unwrap(), Database("other"));
        assert_eq!(kwargs.names().collect::<Vec<_>>(), ["db", "other"]);
    }

    #[test]
    fn test_get_errors() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("db", Database("x"));

        assert!(matches!(
            kwargs.get::<Database>("missing"),
            Err(Error::MissingArgument(name)) if name == "missing"
        ));
        assert!(matches!(
            kwargs.get::<String>("db"),
            Err(Error::ArgumentType { name, .. }) if name == "db"
        ));
        assert_eq!(kwargs.param("db"), None);
    }
}
