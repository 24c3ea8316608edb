//! Decorators that need an injected extension.
//!
//! Some view decorators belong to an extension object, e.g. a cache whose `cached` decorator
//! needs the cache instance. That instance only exists once the injector is built, so the
//! decorator is declared on the view as a [`Deferred`] value and applied by the
//! [`Builder`](crate::builder::Builder) afterwards.

use std::sync::Arc;

use dime_core::{Injector, Key};

use crate::view::ViewFn;

type DecorateFn<E, A> = dyn Fn(&E, A, ViewFn) -> ViewFn + Send + Sync;

type ApplyFn = dyn Fn(&Injector, ViewFn) -> dime_core::Result<ViewFn> + Send + Sync;

/// A decorator of the extension `E`, taking arguments `A`.
///
/// ```
/// use dime_web::decorator::Decorator;
/// use dime_web::view::ViewFn;
///
/// #[derive(Clone)]
/// struct Cache;
///
/// impl Cache {
///     fn cached(&self, _timeout: u64, view: ViewFn) -> ViewFn {
///         view
///     }
/// }
///
/// let cached = Decorator::new(Cache::cached);
/// let deferred = cached.call(30);
/// assert!(deferred.extension().is::<Cache>());
/// ```
pub struct Decorator<E, A> {
    f: Arc<DecorateFn<E, A>>,
}

impl<E, A> Decorator<E, A>
where
    E: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&E, A, ViewFn) -> ViewFn + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Captures the arguments of one use of the decorator.
    ///
    /// Every call yields an independent [`Deferred`], so one decorator can be used on several
    /// views with different arguments.
    pub fn call(&self, args: A) -> Deferred {
        let f = Arc::clone(&self.f);
        Deferred {
            extension: Key::of::<E>(),
            apply: Arc::new(move |injector: &Injector, view: ViewFn| -> dime_core::Result<ViewFn> {
                let extension = injector.get::<E>()?;
                Ok(f(&extension, args.clone(), view))
            }),
        }
    }
}

impl<E, A> Clone for Decorator<E, A> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<E, A> std::fmt::Debug for Decorator<E, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decorator")
            .field("extension", &std::any::type_name::<E>())
            .finish_non_exhaustive()
    }
}

/// A decorator waiting for its extension.
#[derive(Clone)]
pub struct Deferred {
    extension: Key,
    apply: Arc<ApplyFn>,
}

impl Deferred {
    /// Returns the key of the extension the decorator belongs to.
    pub const fn extension(&self) -> Key {
        self.extension
    }

    /// Resolves the extension from `injector` and decorates `view`.
    ///
    /// The extension is resolved outside of any request, so it must not be request scoped.
    ///
    /// # Errors
    ///
    /// Returns the error of resolving the extension.
    pub fn apply(&self, injector: &Injector, view: ViewFn) -> dime_core::Result<ViewFn> {
        (self.apply)(injector, view)
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

/// Applies `decorators` in declaration order: the first one wraps the view itself, the last one
/// wraps all the others.
pub(crate) fn apply_all(
    decorators: &[Deferred],
    injector: &Injector,
    mut view: ViewFn,
) -> Result<ViewFn, (Key, dime_core::Error)> {
    for deferred in decorators {
        view = deferred
            .apply(injector, view)
            .map_err(|err| (deferred.extension, err))?;
        trace!(extension = deferred.extension.type_name(), "applied decorator");
    }
    Ok(view)
}
