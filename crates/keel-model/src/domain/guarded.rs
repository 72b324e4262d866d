use std::{
    fmt,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single independently locked field.
///
/// Readers take the shared lock, writers take the exclusive lock and perform a plain
/// assignment. Values are replaced wholesale, so a poisoned lock still holds a complete
/// value and is recovered instead of propagating the panic.
pub struct Guarded<T> {
    inner: RwLock<T>,
}

impl<T> Guarded<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Replace the value under the exclusive lock.
    pub fn set(&self, value: T) {
        *self.write() = value;
    }

    /// Replace the value only when `accept` approves the transition, returning whether it did.
    ///
    /// The check and the assignment happen under the same exclusive lock.
    pub fn set_if(&self, value: T, accept: impl FnOnce(&T, &T) -> bool) -> bool {
        let mut guard = self.write();
        if accept(&guard, &value) {
            *guard = value;
            true
        } else {
            false
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Guarded<T> {
    /// Copy the value out under the shared lock.
    pub fn get(&self) -> T {
        self.read().clone()
    }
}

impl<T: Default> Default for Guarded<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> Clone for Guarded<T> {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl<T: PartialEq> PartialEq for Guarded<T> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        *self.read() == *other.read()
    }
}

impl<T: Eq> Eq for Guarded<T> {}

impl<T: fmt::Debug> fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read().fmt(f)
    }
}

impl<T: Serialize> Serialize for Guarded<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.read().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Guarded<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Guarded::new)
    }
}

impl<T> From<T> for Guarded<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_if_rejects_when_predicate_fails() {
        let cell = Guarded::new(3);
        assert!(!cell.set_if(1, |cur, next| next > cur));
        assert_eq!(cell.get(), 3);
        assert!(cell.set_if(5, |cur, next| next > cur));
        assert_eq!(cell.get(), 5);
    }

    #[test]
    fn serializes_transparently() {
        let cell = Guarded::new(Some(7));
        assert_eq!(serde_json::to_string(&cell).unwrap(), "7");

        let back: Guarded<Option<i32>> = serde_json::from_str("null").unwrap();
        assert_eq!(back.get(), None);
    }

    #[test]
    fn clone_is_independent() {
        let a = Guarded::new(vec![1]);
        let b = a.clone();
        a.set(vec![2]);
        assert_eq!(b.get(), vec![1]);
    }
}
