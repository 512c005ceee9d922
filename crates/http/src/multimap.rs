//! Ordered multi-value maps used for headers and query parameters.
//!
//! A [`MultiMap`] is a sequence of `(key, value)` pairs where keys may repeat.
//! Insertion order is always preserved, including between duplicates, which is
//! what HTTP needs for repeated header fields like `Set-Cookie` or repeated
//! query arguments like `?a=1&a=2`.
//!
//! Two flavors exist:
//!
//! - [`MultiMap<V>`]: keys compared as given
//! - [`CiMultiMap<V>`]: keys canonicalized to ASCII lower case on every insert and
//!   every probe, so `Content-Type` and `content-type` address the same entries
//!
//! Lookups are linear scans. The maps hold a handful of headers or query
//! arguments, so an index would cost more than it saves.
//!
//! # Example
//!
//! ```
//! use rill_http::multimap::{CiMultiMap, View};
//!
//! let mut headers = CiMultiMap::new();
//! headers.add("Accept", "text/html");
//! headers.add("accept", "application/json");
//!
//! assert_eq!(headers.get_all("ACCEPT").unwrap(), vec![&"text/html", &"application/json"]);
//! assert_eq!(headers.items(View::Unique).count(), 1);
//! ```

use crate::protocol::MultiMapError;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::slice;
use std::vec;

/// Key canonicalization applied on insertion and on lookup.
pub trait KeyCase {
    fn canonicalize(key: &str) -> Cow<'_, str>;
}

/// Keys are compared byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaseSensitive;

/// Keys are folded to ASCII lower case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaseInsensitive;

impl KeyCase for CaseSensitive {
    #[inline]
    fn canonicalize(key: &str) -> Cow<'_, str> {
        Cow::Borrowed(key)
    }
}

impl KeyCase for CaseInsensitive {
    #[inline]
    fn canonicalize(key: &str) -> Cow<'_, str> {
        if key.bytes().any(|b| b.is_ascii_uppercase()) { Cow::Owned(key.to_ascii_lowercase()) } else { Cow::Borrowed(key) }
    }
}

/// Selects between deduplicated and full views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// one pair per distinct key, the first occurrence wins
    Unique,
    /// every pair, duplicates included
    All,
}

/// An ordered map that allows duplicate keys.
pub struct MultiMap<V, C = CaseSensitive> {
    items: Vec<(String, V)>,
    _case: PhantomData<C>,
}

/// A [`MultiMap`] whose keys are case-insensitive.
pub type CiMultiMap<V> = MultiMap<V, CaseInsensitive>;

impl<V, C: KeyCase> MultiMap<V, C> {
    pub fn new() -> Self {
        Self { items: Vec::new(), _case: PhantomData }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { items: Vec::with_capacity(capacity), _case: PhantomData }
    }

    /// Number of pairs, duplicates included.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn canonical(key: String) -> String {
        let folded = match C::canonicalize(&key) {
            Cow::Owned(folded) => Some(folded),
            Cow::Borrowed(_) => None,
        };
        folded.unwrap_or(key)
    }

    fn matching<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a V> + 'a {
        let key = C::canonicalize(key).into_owned();
        self.items.iter().filter(move |(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Appends a pair, keeping any existing values of the key.
    pub fn add<K: Into<String>>(&mut self, key: K, value: V) {
        self.items.push((Self::canonical(key.into()), value));
    }

    /// Replaces every value of the key with a single new pair appended at the end.
    pub fn set<K: Into<String>>(&mut self, key: K, value: V) {
        let key = Self::canonical(key.into());
        self.items.retain(|(k, _)| *k != key);
        self.items.push((key, value));
    }

    /// Removes every pair with the key and returns the removed values in order.
    pub fn remove(&mut self, key: &str) -> Result<Vec<V>, MultiMapError> {
        let canonical = C::canonicalize(key);
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for (k, v) in self.items.drain(..) {
            if *k == *canonical {
                removed.push(v);
            } else {
                kept.push((k, v));
            }
        }
        self.items = kept;

        if removed.is_empty() { Err(MultiMapError::key_not_found(key)) } else { Ok(removed) }
    }

    /// Removes every pair with the key, absent keys included.
    pub fn discard(&mut self, key: &str) {
        let canonical = C::canonicalize(key);
        self.items.retain(|(k, _)| *k != *canonical);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Returns the first value of the key.
    pub fn get(&self, key: &str) -> Result<&V, MultiMapError> {
        self.matching(key).next().ok_or_else(|| MultiMapError::key_not_found(key))
    }

    /// Returns the only value of the key, failing when the key repeats.
    pub fn get_one(&self, key: &str) -> Result<&V, MultiMapError> {
        let mut values = self.matching(key);
        let first = values.next().ok_or_else(|| MultiMapError::key_not_found(key))?;
        let rest = values.count();
        if rest > 0 {
            return Err(MultiMapError::multiple_values(key, rest + 1));
        }
        Ok(first)
    }

    /// Like [`MultiMap::get_one`] but falls back to `default` when the key is absent.
    pub fn get_one_or<'a>(&'a self, key: &str, default: &'a V) -> Result<&'a V, MultiMapError> {
        match self.get_one(key) {
            Err(MultiMapError::KeyNotFound { .. }) => Ok(default),
            other => other,
        }
    }

    /// Returns every value of the key in insertion order, never empty.
    pub fn get_all(&self, key: &str) -> Result<Vec<&V>, MultiMapError> {
        let values = self.matching(key).collect::<Vec<_>>();
        if values.is_empty() { Err(MultiMapError::key_not_found(key)) } else { Ok(values) }
    }

    pub fn get_all_or<'a>(&'a self, key: &str, default: Vec<&'a V>) -> Vec<&'a V> {
        self.get_all(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.matching(key).next().is_some()
    }

    /// Iterates every pair in insertion order.
    pub fn iter(&self) -> Items<'_, V> {
        self.items(View::All)
    }

    pub fn items(&self, view: View) -> Items<'_, V> {
        let seen = match view {
            View::Unique => Some(HashSet::new()),
            View::All => None,
        };
        Items { inner: self.items.iter(), seen }
    }

    pub fn keys(&self, view: View) -> impl Iterator<Item = &str> {
        self.items(view).map(|(k, _)| k)
    }

    pub fn values(&self, view: View) -> impl Iterator<Item = &V> {
        self.items(view).map(|(_, v)| v)
    }
}

impl<V, C: KeyCase> Default for MultiMap<V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone, C> Clone for MultiMap<V, C> {
    fn clone(&self) -> Self {
        Self { items: self.items.clone(), _case: PhantomData }
    }
}

impl<V: fmt::Debug, C> fmt::Debug for MultiMap<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter().map(|(k, v)| (k, v))).finish()
    }
}

/// Pairs are compared as full sequences: order and duplicates matter.
impl<V: PartialEq, C> PartialEq for MultiMap<V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<V: Eq, C> Eq for MultiMap<V, C> {}

/// Against a plain map only the first value of every key takes part.
impl<V: PartialEq, C: KeyCase> PartialEq<HashMap<String, V>> for MultiMap<V, C> {
    fn eq(&self, other: &HashMap<String, V>) -> bool {
        let unique = self.items(View::Unique).collect::<Vec<_>>();
        unique.len() == other.len() && unique.into_iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<String>, V, C: KeyCase> FromIterator<(K, V)> for MultiMap<V, C> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

/// Bulk [`MultiMap::add`].
impl<K: Into<String>, V, C: KeyCase> Extend<(K, V)> for MultiMap<V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<'a, V, C: KeyCase> IntoIterator for &'a MultiMap<V, C> {
    type Item = (&'a str, &'a V);
    type IntoIter = Items<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V, C> IntoIterator for MultiMap<V, C> {
    type Item = (String, V);
    type IntoIter = vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Iterator over the pairs of a [`MultiMap`], see [`MultiMap::items`].
#[derive(Debug)]
pub struct Items<'a, V> {
    inner: slice::Iter<'a, (String, V)>,
    seen: Option<HashSet<&'a str>>,
}

impl<'a, V> Iterator for Items<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value) = self.inner.next()?;
            match &mut self.seen {
                None => return Some((key.as_str(), value)),
                Some(seen) => {
                    if seen.insert(key.as_str()) {
                        return Some((key.as_str(), value));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MultiMap<i32> {
        MultiMap::from_iter([("a", 1), ("b", 2), ("a", 3), ("c", 4), ("b", 5)])
    }

    #[test]
    fn test_items_keep_insertion_order() {
        let map = sample();
        let all = map.items(View::All).collect::<Vec<_>>();
        assert_eq!(all, vec![("a", &1), ("b", &2), ("a", &3), ("c", &4), ("b", &5)]);
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn test_unique_items_keep_first_occurrence() {
        let map = sample();
        let unique = map.items(View::Unique).collect::<Vec<_>>();
        assert_eq!(unique, vec![("a", &1), ("b", &2), ("c", &4)]);

        assert_eq!(map.keys(View::Unique).collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(map.keys(View::All).collect::<Vec<_>>(), vec!["a", "b", "a", "c", "b"]);
        assert_eq!(map.values(View::Unique).copied().collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn test_get_variants() {
        let map = sample();
        assert_eq!(map.get("a"), Ok(&1));
        assert_eq!(map.get_all("b"), Ok(vec![&2, &5]));
        assert_eq!(map.get_one("c"), Ok(&4));
        assert_eq!(map.get_one("a"), Err(MultiMapError::multiple_values("a", 2)));
        assert_eq!(map.get("z"), Err(MultiMapError::key_not_found("z")));
        assert_eq!(map.get_all("z"), Err(MultiMapError::key_not_found("z")));

        let fallback = 42;
        assert_eq!(map.get_one_or("z", &fallback), Ok(&42));
        assert!(map.get_one_or("a", &fallback).is_err());
        assert_eq!(map.get_all_or("z", vec![&fallback]), vec![&42]);
    }

    #[test]
    fn test_set_replaces_every_value() {
        let mut map = sample();
        map.set("a", 10);
        assert_eq!(map.get_all("a"), Ok(vec![&10]));
        assert_eq!(map.keys(View::All).collect::<Vec<_>>(), vec!["b", "c", "b", "a"]);
    }

    #[test]
    fn test_remove() {
        let mut map = sample();
        assert_eq!(map.remove("b"), Ok(vec![2, 5]));
        assert!(!map.contains_key("b"));
        assert_eq!(map.len(), 3);
        assert_eq!(map.remove("b"), Err(MultiMapError::key_not_found("b")));
    }

    #[test]
    fn test_discard_ignores_absent_keys() {
        let mut map = sample();
        map.discard("a");
        map.discard("z");
        assert_eq!(map.keys(View::All).collect::<Vec<_>>(), vec!["b", "c", "b"]);

        let mut headers = CiMultiMap::new();
        headers.add("Content-Length", "3");
        headers.discard("CONTENT-LENGTH");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_extend_appends() {
        let mut map = MultiMap::<i32>::new();
        map.add("a", 1);
        map.extend([("a", 2), ("b", 3)]);
        assert_eq!(map.get_all("a"), Ok(vec![&1, &2]));
        assert_eq!(map.get("b"), Ok(&3));
    }

    #[test]
    fn test_case_insensitive() {
        let mut headers = CiMultiMap::new();
        headers.add("Content-Type", "a");
        headers.add("CONTENT-type", "b");

        assert_eq!(headers.get("content-type"), Ok(&"a"));
        assert_eq!(headers.get_all("Content-Type"), Ok(vec![&"a", &"b"]));
        assert!(headers.contains_key("CONTENT-TYPE"));
        assert_eq!(headers.keys(View::Unique).collect::<Vec<_>>(), vec!["content-type"]);

        assert_eq!(headers.remove("content-TYPE"), Ok(vec!["a", "b"]));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_case_sensitive_keys_are_distinct() {
        let mut map = MultiMap::<i32>::new();
        map.add("Key", 1);
        assert!(map.get("key").is_err());
        assert!(map.contains_key("Key"));
    }

    #[test]
    fn test_equality() {
        let one = MultiMap::<i32>::from_iter([("a", 1), ("a", 2)]);
        let two = MultiMap::<i32>::from_iter([("a", 2), ("a", 1)]);
        assert_ne!(one, two);
        assert_eq!(one, one.clone());

        let plain = HashMap::from([("a".to_string(), 1)]);
        assert!(one == plain);
        assert!(two != plain);
    }
}
