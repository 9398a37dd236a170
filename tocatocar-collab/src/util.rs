use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;

lazy_static! {
    /// Matches a missing or partial scheme at the start of a link, like `www.` or `//`
    pub static ref URL_SCHEME_REGEX: Regex = Regex::new(r"^(?:https?:)?(?://)?").unwrap();
}

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for any type.
pub struct Id<T> {
    value: u64,
    kind: PhantomData<T>,
}

impl<T> Id<T> {
    /// Creates a new id.
    pub fn new() -> Self {
        Self {
            value: ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            kind: PhantomData,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}
impl<T> Eq for Id<T> {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        struct Thing;

        let first = Id::<Thing>::new();
        let second = Id::<Thing>::new();

        assert_ne!(first, second);
        assert!(second.value() > first.value());
    }

    #[test]
    fn test_random_string_length() {
        assert_eq!(random_string(32).len(), 32);
        assert!(random_string(8).chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
