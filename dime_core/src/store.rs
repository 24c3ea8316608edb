//! Collection type for values keyed by their binding [`Key`].

use std::collections::HashMap;

use crate::erased::Erased;
use crate::key::Key;

/// [`Store`] is a collection of values of arbitrary type.
///
/// Each value is identified by the [`Key`] it was bound under. Therefore, a [`Store`] can only
/// contain at most one value for each unique concrete type. If you need to store multiple values
/// with the same type, you can use newtype pattern.
#[derive(Debug, Clone, Default)]
pub struct Store(HashMap<Key, Erased>);

impl Store {
    /// Creates a new [`Store`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Inserts a value of the specified type into the store, returning the previous one.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.insert_erased(Erased::new(value))
            .and_then(|v| v.downcast().ok())
    }

    /// Inserts an [`Erased`] value under the key of its concrete type.
    #[inline]
    pub fn insert_erased(&mut self, value: Erased) -> Option<Erased> {
        self.0.insert(value.key(), value)
    }

    /// Returns the value stored under `key`, inserting `value` first if there is none.
    ///
    /// When a value is already present, `value` is dropped and the existing one is kept.
    pub fn get_or_insert_erased(&mut self, key: Key, value: Erased) -> &Erased {
        self.0.entry(key).or_insert(value)
    }

    /// Returns a reference to the value of the specified type.
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_erased(Key::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Returns a reference to the [`Erased`] value stored under `key`.
    #[inline]
    pub fn get_erased(&self, key: Key) -> Option<&Erased> {
        self.0.get(&key)
    }

    /// Removes a value of the specified type from the store and returns it, if one exists.
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.remove_erased(Key::of::<T>())
            .and_then(|v| v.downcast().ok())
    }

    /// Removes the value stored under `key` and returns the [`Erased`] version of it.
    #[inline]
    pub fn remove_erased(&mut self, key: Key) -> Option<Erased> {
        self.0.remove(&key)
    }

    /// Returns `true` if the store contains a value stored under `key`.
    #[inline]
    pub fn contains_key(&self, key: Key) -> bool {
        self.0.contains_key(&key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drops every stored value.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut store = Store::new();
        assert!(store.insert("owned".to_string()).is_none());
        assert!(store.insert("borrowed").is_none());
        let got: &String = store.get().unwrap();
        assert_eq!(got, "owned");
        assert!(store.get::<i32>().is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_and_replace() {
        let mut store = Store::new();
        assert!(store.insert("owned".to_string()).is_none());
        let got = store.insert("owned2".to_string()).unwrap();
        assert_eq!(got, "owned");
        let got: &String = store.get().unwrap();
        assert_eq!(got, "owned2");
    }

    #[test]
    fn test_get_or_insert_keeps_first() {
        let mut store = Store::new();
        let key = Key::of::<u32>();
        store.get_or_insert_erased(key, Erased::new(1_u32));
        let kept = store.get_or_insert_erased(key, Erased::new(2_u32));
        assert_eq!(kept.downcast_ref::<u32>(), Some(&1));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut store = Store::new();
        store.insert("owned".to_string());
        store.insert(7_u8);
        let got: String = store.remove().unwrap();
        assert_eq!(got, "owned");
        assert!(!store.contains_key(Key::of::<String>()));

        store.clear();
        assert!(store.is_empty());
    }
}
