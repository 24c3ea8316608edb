//! Values with erased type information.

use std::any::Any;

use crate::key::Key;

/// [`CloneBoxed`] is a trait to clone a reference to an `?Sized` type into a [`Box`].
///
/// This trait is used to work around [`Sized`] bound on [`Clone`].
trait CloneBoxed: Any + Send + Sync {
    /// Returns the boxed clone of `self`.
    fn clone_boxed(&self) -> Box<dyn CloneBoxed>;

    fn as_any(&self) -> &(dyn Any + Send + Sync);

    fn as_any_mut(&mut self) -> &mut (dyn Any + Send + Sync);

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T> CloneBoxed for T
where
    T: Any + Clone + Send + Sync,
{
    fn clone_boxed(&self) -> Box<dyn CloneBoxed> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn as_any_mut(&mut self) -> &mut (dyn Any + Send + Sync) {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// [`Erased`] is a container for a bound value of an arbitrary type, as long as it
/// implements [`Clone`], [`Send`], and [`Sync`] and is `'static`.
///
/// Scopes and providers pass values around as `Erased`; cloning it clones the underlying value,
/// so shared instances are usually bound behind an [`Arc`](std::sync::Arc).
pub struct Erased {
    value: Box<dyn CloneBoxed>,
    key: Key,
}

impl Erased {
    /// Creates a new `Erased` with the provided `value` of type `T`.
    #[must_use]
    pub fn new<T>(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self {
            value: Box::new(value),
            key: Key::of::<T>(),
        }
    }

    /// Returns the key of the concrete type stored in `self`.
    pub const fn key(&self) -> Key {
        self.key
    }

    /// Tries to downcast `self` into type `T`.
    ///
    /// # Errors
    ///
    /// If the underlying value is not of type `T`, this method will return
    /// itself as error.
    pub fn downcast<T>(self) -> Result<T, Self>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !self.key.is::<T>() {
            return Err(self);
        }

        match self.value.into_any().downcast::<T>() {
            Ok(concrete) => Ok(*concrete),
            Err(_) => unreachable!("the key of an `Erased` always matches its value"),
        }
    }
}

impl std::ops::Deref for Erased {
    type Target = dyn Any + Send + Sync;

    fn deref(&self) -> &Self::Target {
        self.value.as_any()
    }
}

impl std::ops::DerefMut for Erased {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_any_mut()
    }
}

impl Clone for Erased {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone_boxed(),
            key: self.key,
        }
    }
}

impl std::fmt::Debug for Erased {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Erased")
            .field("type", &self.key.type_name())
            .finish_non_exhaustive()
    }
}
