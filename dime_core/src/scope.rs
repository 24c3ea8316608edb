//! Scopes decide how long a bound value is reused.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use crate::erased::Erased;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::store::Store;

/// The scope a binding is resolved in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every resolution calls the provider again.
    #[default]
    NoScope,
    /// The first resolution is cached for the lifetime of the injector.
    Singleton,
    /// The first resolution is cached until the current request scope is reset.
    Request,
}

/// Values whose lifetime is bound to a single request.
///
/// A `RequestScope` is created by the host for every request it dispatches and passed by
/// reference to [`Injector::resolver`](crate::injector::Injector::resolver). It holds two stores:
///
/// - the *cache* of request-scoped values created on demand by [`get`](Self::get), and
/// - the request *locals*, values the host hands in up front (such as the request itself).
///
/// [`reset`](Self::reset) drops both. Use [`guard`](Self::guard) to make the reset run whatever
/// way the request ends.
#[derive(Debug, Default)]
pub struct RequestScope {
    cache: Mutex<Store>,
    locals: Mutex<Store>,
}

// A panicking provider must not make the scope unusable: the reset that follows it still has to
// clear the stores.
fn lock(store: &Mutex<Store>) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value cached under `key`, creating it with `provider` if there is none yet.
    ///
    /// The provider runs without the cache locked, so it may itself resolve other request-scoped
    /// values.
    ///
    /// # Errors
    ///
    /// Returns the error of `provider`. Nothing is cached in that case.
    pub fn get_erased<F>(&self, key: Key, provider: F) -> Result<Erased>
    where
        F: FnOnce() -> Result<Erased>,
    {
        if let Some(value) = lock(&self.cache).get_erased(key) {
            return Ok(value.clone());
        }

        let value = provider()?;
        if value.key() != key {
            return Err(Error::TypeMismatch {
                expected: key,
                found: value.key(),
            });
        }

        trace!(key = key.type_name(), "cached request scoped value");
        Ok(lock(&self.cache).get_or_insert_erased(key, value).clone())
    }

    /// Typed variant of [`get_erased`](Self::get_erased), keyed by `T`.
    ///
    /// Calling it twice within the same request returns the same instance; after
    /// [`reset`](Self::reset) the provider runs again.
    ///
    /// # Errors
    ///
    /// Returns the error of `provider`.
    pub fn get<T, F>(&self, provider: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<T>,
    {
        let value = self.get_erased(Key::of::<T>(), || provider().map(Erased::new))?;
        value.downcast().map_err(|value| Error::TypeMismatch {
            expected: Key::of::<T>(),
            found: value.key(),
        })
    }

    /// Hands a request local to the scope, returning the one it replaces.
    pub fn provide<T>(&self, value: T) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        lock(&self.locals).insert(value)
    }

    /// Returns a clone of the request local of type `T`.
    pub fn local<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        lock(&self.locals).get::<T>().cloned()
    }

    pub fn local_erased(&self, key: Key) -> Option<Erased> {
        lock(&self.locals).get_erased(key).cloned()
    }

    /// Drops every cached value and every request local.
    pub fn reset(&self) {
        // Values are dropped after the locks are released, as their destructors may be arbitrary.
        let cache = std::mem::take(&mut *lock(&self.cache));
        let locals = std::mem::take(&mut *lock(&self.locals));
        trace!(
            cached = cache.len(),
            locals = locals.len(),
            "reset request scope"
        );
        drop(cache);
        drop(locals);
    }

    /// Returns `true` if no request-scoped value is cached.
    pub fn is_empty(&self) -> bool {
        lock(&self.cache).is_empty()
    }

    /// Returns the number of cached request-scoped values.
    pub fn len(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Returns a guard that resets the scope when dropped.
    #[must_use = "the scope is reset as soon as the guard is dropped"]
    pub const fn guard(&self) -> ResetGuard<'_> {
        ResetGuard { scope: self }
    }
}

/// Resets a [`RequestScope`] on drop.
///
/// Dropping happens on normal return, on early return through `?`, while unwinding from a panic
/// and when the future holding the guard is cancelled.
#[derive(Debug)]
pub struct ResetGuard<'a> {
    scope: &'a RequestScope,
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        self.scope.reset();
    }
}

/// Values shared by every resolution of one injector.
#[derive(Debug, Default)]
pub struct SingletonScope {
    cache: RwLock<Store>,
}

impl SingletonScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value cached under `key`, creating it with `provider` if there is none yet.
    ///
    /// If two threads race on the first resolution, both providers may run, but only the value
    /// stored first is kept and returned to both.
    ///
    /// # Errors
    ///
    /// Returns the error of `provider`.
    pub fn get_erased<F>(&self, key: Key, provider: F) -> Result<Erased>
    where
        F: FnOnce() -> Result<Erased>,
    {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = cache.get_erased(key) {
                return Ok(value.clone());
            }
        }

        let value = provider()?;
        if value.key() != key {
            return Err(Error::TypeMismatch {
                expected: key,
                found: value.key(),
            });
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        debug!(key = key.type_name(), "cached singleton");
        Ok(cache.get_or_insert_erased(key, value).clone())
    }

    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
