//! Binding keys.

use std::any::{TypeId, type_name};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Identifies a binding in a [`Binder`](crate::binder::Binder) or a value in a scope.
///
/// Two keys are equal when they were created for the same type. The type name is only carried
/// along for diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
}

impl Key {
    /// Returns the key of type `T`.
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if this is the key of type `T`.
    pub fn is<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_id.cmp(&other.type_id)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
