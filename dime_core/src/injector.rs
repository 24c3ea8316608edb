//! [`Injector`] and the [`Resolver`] used to pull values out of it.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::binder::{Binder, Binding, Module, Provider};
use crate::erased::Erased;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::scope::{RequestScope, Scope, SingletonScope};

/// A frozen registry of bindings.
///
/// The bindings never change once the injector is built; the only shared mutable state is the
/// cache of singletons. An injector is usually shared behind an [`Arc`](std::sync::Arc) by every
/// request of an application.
#[derive(Debug)]
pub struct Injector {
    bindings: BTreeMap<Key, Binding>,
    singletons: SingletonScope,
}

impl Injector {
    /// Builds an injector from a single module.
    pub fn new<M>(module: &M) -> Self
    where
        M: Module + ?Sized,
    {
        let mut binder = Binder::new();
        binder.install(module);
        binder.build()
    }

    pub(crate) fn from_bindings(bindings: BTreeMap<Key, Binding>) -> Self {
        Self {
            bindings,
            singletons: SingletonScope::new(),
        }
    }

    /// Starts a resolution pass.
    ///
    /// Request-scoped and request-local bindings can only be resolved when `scope` is given.
    pub const fn resolver<'a>(&'a self, scope: Option<&'a RequestScope>) -> Resolver<'a> {
        Resolver {
            injector: self,
            scope,
            resolving: RefCell::new(Vec::new()),
        }
    }

    /// Resolves `T` outside of any request.
    ///
    /// # Errors
    ///
    /// See [`Resolver::get`].
    pub fn get<T>(&self) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.resolver(None).get()
    }

    pub fn is_bound<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.bindings.contains_key(&Key::of::<T>())
    }

    /// Returns the scope `key` is bound in, if it is bound.
    pub fn scope_of(&self, key: Key) -> Option<Scope> {
        self.bindings.get(&key).map(|binding| binding.scope)
    }

    /// Iterates over the bound keys.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.bindings.keys().copied()
    }
}

/// One resolution pass against an [`Injector`] and, optionally, a [`RequestScope`].
///
/// Providers receive the resolver so they can ask for their own dependencies. The resolver
/// tracks the keys being resolved and fails with [`Error::Cycle`] when a provider asks for a key
/// it is itself producing.
#[derive(Debug)]
pub struct Resolver<'a> {
    injector: &'a Injector,
    scope: Option<&'a RequestScope>,
    resolving: RefCell<Vec<Key>>,
}

struct Entered<'r> {
    resolving: &'r RefCell<Vec<Key>>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.resolving.borrow_mut().pop();
    }
}

impl<'a> Resolver<'a> {
    pub const fn injector(&self) -> &'a Injector {
        self.injector
    }

    pub const fn request_scope(&self) -> Option<&'a RequestScope> {
        self.scope
    }

    /// Resolves a value of type `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::Unbound`] if nothing is bound to `T`.
    /// - [`Error::OutsideRequest`] if `T` lives in the request scope and there is none.
    /// - [`Error::MissingLocal`] if `T` is a request local the host did not provide.
    /// - [`Error::Cycle`] if resolving `T` requires `T`.
    /// - Any error returned by the provider.
    pub fn get<T>(&self) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_erased(Key::of::<T>())?
            .downcast()
            .map_err(|value| Error::TypeMismatch {
                expected: Key::of::<T>(),
                found: value.key(),
            })
    }

    /// Resolves several values at once, e.g. `resolver.get_all::<(Database, Config)>()`.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered, see [`get`](Self::get).
    pub fn get_all<D>(&self) -> Result<D>
    where
        D: Dependencies,
    {
        D::resolve_from(self)
    }

    /// Resolves the value bound to `key`.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn get_erased(&self, key: Key) -> Result<Erased> {
        let binding = self
            .injector
            .bindings
            .get(&key)
            .ok_or(Error::Unbound(key))?;

        let provider = match &binding.provider {
            Provider::Instance(value) => return Ok(value.clone()),
            Provider::Local => {
                let scope = self.scope.ok_or(Error::OutsideRequest(key))?;
                return scope.local_erased(key).ok_or(Error::MissingLocal(key));
            }
            Provider::Factory(provider) => provider,
        };

        let _entered = self.enter(key)?;
        match binding.scope {
            Scope::NoScope => provider(self),
            Scope::Singleton => self
                .injector
                .singletons
                .get_erased(key, || provider(self)),
            Scope::Request => self
                .scope
                .ok_or(Error::OutsideRequest(key))?
                .get_erased(key, || provider(self)),
        }
    }

    fn enter(&self, key: Key) -> Result<Entered<'_>> {
        let mut resolving = self.resolving.borrow_mut();
        if resolving.contains(&key) {
            let mut path = resolving.clone();
            path.push(key);
            return Err(Error::Cycle(path));
        }
        resolving.push(key);

        Ok(Entered {
            resolving: &self.resolving,
        })
    }
}

/// A group of values resolved together with [`Resolver::get_all`].
///
/// Implemented for tuples of up to twelve bound types.
pub trait Dependencies: Sized {
    /// Resolves every member of the group.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    fn resolve_from(resolver: &Resolver<'_>) -> Result<Self>;
}

macro_rules! impl_dependencies_tuple {
    ($($ty:ident),*) => {
        impl<$($ty,)*> Dependencies for ($($ty,)*)
        where
            $($ty: Clone + Send + Sync + 'static,)*
        {
            fn resolve_from(resolver: &Resolver<'_>) -> Result<Self> {
                Ok((
                    $( resolver.get::<$ty>()?, )*
                ))
            }
        }
    };
}

apply_tuples!(impl_dependencies_tuple);

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::binder::Injectable;

    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Address(&'static str);

    #[derive(Clone, Debug)]
    struct Database(Arc<DatabaseInner>);

    #[derive(Debug)]
    struct DatabaseInner {
        address: Address,
        serial: usize,
    }

    impl Database {
        fn connect(address: Address, serial: usize) -> Self {
            Self(Arc::new(DatabaseInner { address, serial }))
        }
    }

    fn database_module(scope: Scope) -> (Arc<AtomicUsize>, impl Fn(&mut Binder)) {
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);
        let module = move |binder: &mut Binder| {
            let counter = Arc::clone(&counter);
            binder
                .bind_instance(Address("foo"))
                .bind_provider(scope, move |resolver: &Resolver<'_>| {
                    let address = resolver.get::<Address>()?;
                    let serial = counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Database::connect(address, serial))
                });
        };
        (connections, module)
    }

    #[test]
    fn test_instance_binding() {
        let (_, module) = database_module(Scope::NoScope);
        let injector = Injector::new(&module);
        assert_eq!(injector.get::<Address>().unwrap(), Address("foo"));
    }

    #[test]
    fn test_no_scope_creates_new_values() {
        let (connections, module) = database_module(Scope::NoScope);
        let injector = Injector::new(&module);

        let a = injector.get::<Database>().unwrap();
        let b = injector.get::<Database>().unwrap();
        assert!(!Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(connections.load(Ordering::SeqCst), 2);
        assert_eq!(a.0.address, Address("foo"));
    }

    #[test]
    fn test_singleton_is_shared() {
        let (connections, module) = database_module(Scope::Singleton);
        let injector = Injector::new(&module);

        let a = injector.get::<Database>().unwrap();
        let b = injector.get::<Database>().unwrap();
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_request_scope_requires_request() {
        let (_, module) = database_module(Scope::Request);
        let injector = Injector::new(&module);

        let err = injector.get::<Database>().unwrap_err();
        assert!(err.is_outside_request());
    }

    #[test]
    fn test_request_scope_is_per_request() {
        let (connections, module) = database_module(Scope::Request);
        let injector = Injector::new(&module);

        let first = RequestScope::new();
        let a = injector.resolver(Some(&first)).get::<Database>().unwrap();
        let b = injector.resolver(Some(&first)).get::<Database>().unwrap();
        assert!(Arc::ptr_eq(&a.0, &b.0));

        let second = RequestScope::new();
        let c = injector.resolver(Some(&second)).get::<Database>().unwrap();
        assert!(!Arc::ptr_eq(&a.0, &c.0));
        assert_eq!(c.0.serial, 1);
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_local() {
        let injector = Injector::new(&|binder: &mut Binder| {
            binder.bind_local::<Address>();
        });

        assert!(injector.get::<Address>().unwrap_err().is_outside_request());

        let scope = RequestScope::new();
        let err = injector.resolver(Some(&scope)).get::<Address>().unwrap_err();
        assert!(err.is_missing_local());

        scope.provide(Address("bar"));
        let got = injector.resolver(Some(&scope)).get::<Address>().unwrap();
        assert_eq!(got, Address("bar"));
    }

    #[test]
    fn test_unbound() {
        let injector = Binder::new().build();
        let err = injector.get::<Address>().unwrap_err();
        assert!(err.is_unbound_for::<Address>());
    }

    #[test]
    fn test_cycle_is_detected() {
        #[derive(Clone, Debug)]
        struct Chicken;
        #[derive(Clone, Debug)]
        struct Egg;

        let injector = Injector::new(&|binder: &mut Binder| {
            binder
                .bind_provider(Scope::NoScope, |resolver: &Resolver<'_>| {
                    resolver.get::<Egg>().map(|_| Chicken)
                })
                .bind_provider(Scope::NoScope, |resolver: &Resolver<'_>| {
                    resolver.get::<Chicken>().map(|_| Egg)
                });
        });

        match injector.get::<Chicken>().unwrap_err() {
            Error::Cycle(path) => {
                assert_eq!(path.len(), 3);
                assert!(path[0].is::<Chicken>());
                assert!(path[1].is::<Egg>());
                assert!(path[2].is::<Chicken>());
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn test_resolver_can_be_reused_after_error() {
        let (_, module) = database_module(Scope::NoScope);
        let injector = Injector::new(&module);
        let resolver = injector.resolver(None);

        assert!(resolver.get::<u8>().unwrap_err().is_unbound());
        assert!(resolver.get::<Database>().is_ok());
        assert!(resolver.get::<Database>().is_ok());
    }

    #[test]
    fn test_get_all() {
        let (_, module) = database_module(Scope::Singleton);
        let injector = Injector::new(&module);

        let (address, db) = injector
            .resolver(None)
            .get_all::<(Address, Database)>()
            .unwrap();
        assert_eq!(address, db.0.address);
    }

    #[test]
    fn test_injectable_and_rebinding() {
        #[derive(Clone, Debug)]
        struct Repository {
            db: Database,
        }

        impl Injectable for Repository {
            fn inject(resolver: &Resolver<'_>) -> Result<Self> {
                Ok(Self { db: resolver.get()? })
            }
        }

        let (_, module) = database_module(Scope::Singleton);
        let mut binder = Binder::new();
        binder
            .install(&module)
            .bind_instance(Address("replaced"))
            .bind_injectable::<Repository>(Scope::NoScope);
        assert!(binder.is_bound::<Repository>());
        let injector = binder.build();

        let repo = injector.get::<Repository>().unwrap();
        assert_eq!(repo.db.0.address, Address("replaced"));
        assert_eq!(injector.scope_of(Key::of::<Repository>()), Some(Scope::NoScope));
        assert_eq!(injector.keys().count(), 3);
    }
}
