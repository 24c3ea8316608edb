//! Dependency declarations of views.

use dime_core::{Erased, Key, Resolver};

/// The dependencies a view asks for, by argument name.
///
/// ```
/// use dime_web::inject::Inject;
///
/// #[derive(Clone)]
/// struct Database;
///
/// let inject = Inject::new().with::<Database>("db");
/// assert_eq!(inject.names().collect::<Vec<_>>(), ["db"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inject {
    dependencies: Vec<(String, Key)>,
}

impl Inject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that argument `name` is resolved as a `T`.
    ///
    /// Declaring a name twice keeps the last declaration.
    #[must_use]
    pub fn with<T>(self, name: impl Into<String>) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.with_key(name, Key::of::<T>())
    }

    #[must_use]
    pub fn with_key(mut self, name: impl Into<String>, key: Key) -> Self {
        let name = name.into();
        self.dependencies.retain(|(existing, _)| *existing != name);
        self.dependencies.push((name, key));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Key)> {
        self.dependencies
            .iter()
            .map(|(name, key)| (name.as_str(), *key))
    }

    /// Resolves every declared dependency, in declaration order.
    pub(crate) fn resolve(&self, resolver: &Resolver<'_>) -> dime_core::Result<Vec<(String, Erased)>> {
        self.dependencies
            .iter()
            .map(|(name, key)| Ok((name.clone(), resolver.get_erased(*key)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use dime_core::{Binder, RequestScope, Scope};

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Database(u32);

    #[derive(Clone, Debug, PartialEq)]
    struct Cache;

    #[test]
    fn test_redeclaring_keeps_last() {
        let inject = Inject::new()
            .with::<Database>("db")
            .with::<Cache>("cache")
            .with::<Cache>("db");

        assert_eq!(inject.len(), 2);
        let declared: Vec<_> = inject.iter().collect();
        assert_eq!(declared[0], ("cache", Key::of::<Cache>()));
        assert_eq!(declared[1], ("db", Key::of::<Cache>()));
    }

    #[test]
    fn test_resolve() {
        let mut binder = Binder::new();
        binder
            .bind_instance(Cache)
            .bind_provider(Scope::Request, |_: &Resolver<'_>| Ok(Database(1)));
        let injector = binder.build();

        let inject = Inject::new().with::<Database>("db").with::<Cache>("cache");
        let scope = RequestScope::new();
        let values = inject.resolve(&injector.resolver(Some(&scope))).unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].0, "db");
        assert_eq!(values[0].1.downcast_ref::<Database>(), Some(&Database(1)));
        assert_eq!(scope.len(), 1);

        let err = inject.resolve(&injector.resolver(None)).unwrap_err();
        assert!(err.is_outside_request());
    }
}
