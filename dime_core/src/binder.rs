//! Registration of bindings.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::erased::Erased;
use crate::error::Result;
use crate::injector::{Injector, Resolver};
use crate::key::Key;
use crate::scope::Scope;

pub(crate) type ProviderFn = Arc<dyn Fn(&Resolver<'_>) -> Result<Erased> + Send + Sync>;

/// How the value of a binding is obtained.
#[derive(Clone)]
pub(crate) enum Provider {
    /// A value bound up front; every resolution returns a clone of it.
    Instance(Erased),
    /// A provider function, cached according to the binding scope.
    Factory(ProviderFn),
    /// A value the host hands to each [`RequestScope`](crate::scope::RequestScope).
    Local,
}

#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) scope: Scope,
    pub(crate) provider: Provider,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provider = match &self.provider {
            Provider::Instance(_) => "instance",
            Provider::Factory(_) => "factory",
            Provider::Local => "local",
        };
        f.debug_struct("Binding")
            .field("scope", &self.scope)
            .field("provider", &provider)
            .finish()
    }
}

/// A type that knows how to build itself from the injector.
///
/// This is the counterpart of a constructor taking injected arguments: bind it with
/// [`Binder::bind_injectable`], and the injector will call [`inject`](Self::inject) whenever the
/// binding's scope asks for a new value.
pub trait Injectable: Clone + Send + Sync + Sized + 'static {
    /// Builds a value, resolving its dependencies from `resolver`.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the dependencies cannot be resolved.
    fn inject(resolver: &Resolver<'_>) -> Result<Self>;
}

/// A unit of configuration for a [`Binder`].
///
/// Closures taking `&mut Binder` are modules:
///
/// ```
/// use dime_core::Binder;
///
/// #[derive(Clone)]
/// struct Greeting(&'static str);
///
/// let mut binder = Binder::new();
/// binder.install(&|binder: &mut Binder| {
///     binder.bind_instance(Greeting("hello"));
/// });
///
/// let injector = binder.build();
/// assert_eq!(injector.get::<Greeting>().unwrap().0, "hello");
/// ```
pub trait Module {
    /// Registers the module's bindings.
    fn configure(&self, binder: &mut Binder);
}

impl<F> Module for F
where
    F: Fn(&mut Binder),
{
    fn configure(&self, binder: &mut Binder) {
        self(binder);
    }
}

/// Collects bindings and freezes them into an [`Injector`].
///
/// Binding the same type twice replaces the first binding.
#[derive(Debug, Default)]
pub struct Binder {
    bindings: BTreeMap<Key, Binding>,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, key: Key, binding: Binding) -> &mut Self {
        if self.bindings.insert(key, binding).is_some() {
            debug!(key = key.type_name(), "replaced binding");
        } else {
            trace!(key = key.type_name(), "bound");
        }
        self
    }

    /// Binds `T` to a fixed value. Every resolution returns a clone of `value`.
    pub fn bind_instance<T>(&mut self, value: T) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.insert(
            Key::of::<T>(),
            Binding {
                scope: Scope::Singleton,
                provider: Provider::Instance(Erased::new(value)),
            },
        )
    }

    /// Binds `T` to a provider function resolved in `scope`.
    pub fn bind_provider<T, F>(&mut self, scope: Scope, provider: F) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let provider: ProviderFn =
            Arc::new(move |resolver: &Resolver<'_>| provider(resolver).map(Erased::new));
        self.insert(
            Key::of::<T>(),
            Binding {
                scope,
                provider: Provider::Factory(provider),
            },
        )
    }

    /// Binds `T` to its [`Injectable::inject`] constructor resolved in `scope`.
    pub fn bind_injectable<T>(&mut self, scope: Scope) -> &mut Self
    where
        T: Injectable,
    {
        self.bind_provider(scope, |resolver: &Resolver<'_>| T::inject(resolver))
    }

    /// Declares `T` as a request local: the host provides its value to every
    /// [`RequestScope`](crate::scope::RequestScope) it opens.
    pub fn bind_local<T>(&mut self) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.insert(
            Key::of::<T>(),
            Binding {
                scope: Scope::Request,
                provider: Provider::Local,
            },
        )
    }

    /// Lets `module` register its bindings.
    pub fn install<M>(&mut self, module: &M) -> &mut Self
    where
        M: Module + ?Sized,
    {
        module.configure(self);
        self
    }

    pub fn is_bound<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.is_bound_key(Key::of::<T>())
    }

    pub fn is_bound_key(&self, key: Key) -> bool {
        self.bindings.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Freezes the bindings.
    #[must_use]
    pub fn build(self) -> Injector {
        debug!(bindings = self.bindings.len(), "built injector");
        Injector::from_bindings(self.bindings)
    }
}
