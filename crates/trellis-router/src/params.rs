//! Path parameter bindings.
//!
//! Bindings are kept in match order. Most routes bind one to three
//! parameters, so the storage is a small vector that stays inline for
//! up to four pairs.

use smallvec::SmallVec;

const INLINE_PARAMS: usize = 4;

/// Positional `name → value` bindings produced by a route match.
///
/// # Example
///
/// ```rust
/// use trellis_router::Params;
///
/// let mut params = Params::new();
/// params.push("id", "42");
/// params.push("postId", "7");
///
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.get("postId"), Some("7"));
/// assert_eq!(params.get("missing"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty set of bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a binding.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Sets `name` to `value`, replacing an existing binding of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.inner.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns true if there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over the bindings in match order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Drops every binding after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.inner.truncate(len);
    }

    /// Clears all bindings, retaining allocated capacity.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, String)>,
        fn(&'a (String, String)) -> (&'a str, &'a str),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_push_and_get() {
        let mut params = Params::new();
        params.push("id", "42");
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.len(), 1);
        assert!(params.contains("id"));
        assert!(!params.contains("name"));
    }

    #[test]
    fn test_params_set_replaces() {
        let mut params = Params::new();
        params.push("id", "1");
        params.set("id", "2");
        params.set("name", "ada");
        assert_eq!(params.get("id"), Some("2"));
        assert_eq!(params.get("name"), Some("ada"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_params_truncate_keeps_prefix() {
        let mut params: Params = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        params.truncate(1);
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("a", "1")]);
    }

    #[test]
    fn test_params_clear() {
        let mut params: Params = [("a", "1")].into_iter().collect();
        params.clear();
        assert!(params.is_empty());
    }

    #[test]
    fn test_params_spills_past_inline_capacity() {
        let params: Params = (0..8).map(|i| (format!("p{i}"), i.to_string())).collect();
        assert_eq!(params.len(), 8);
        assert_eq!(params.get("p7"), Some("7"));
    }
}
