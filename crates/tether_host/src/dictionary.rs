use crate::variant::Variant;
use indexmap::IndexMap;

/// Host key/value mapping.
///
/// Iteration follows insertion order, but equality ignores it: two
/// dictionaries are equal when they hold the same key/value pairs.
#[derive(Debug, Clone, Default)]
pub struct Dictionary(IndexMap<Variant, Variant>);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert or replace, returning the previous value for `key`.
    pub fn insert(&mut self, key: impl Into<Variant>, value: impl Into<Variant>) -> Option<Variant> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &Variant) -> Option<&Variant> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &Variant) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &Variant) -> Option<Variant> {
        self.0.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Variant> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Variant> {
        self.0.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variant, &Variant)> {
        self.0.iter()
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl Eq for Dictionary {}

impl<K: Into<Variant>, V: Into<Variant>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Dictionary(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Dictionary {
    type Item = (Variant, Variant);
    type IntoIter = indexmap::map::IntoIter<Variant, Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Variant, &'a Variant);
    type IntoIter = indexmap::map::Iter<'a, Variant, Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn equality_ignores_insertion_order() {
        let a: Dictionary = [("a", 1), ("b", 2)].into_iter().collect();
        let b: Dictionary = [("b", 2), ("a", 1)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(Variant::from(a), Variant::from(b));
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let dict: Dictionary = [("z", 1), ("a", 2), ("m", 3)].into_iter().collect();
        let keys: Vec<_> = dict.keys().filter_map(Variant::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn insert_replaces_existing_key() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.insert("k", 1), None);
        assert_eq!(dict.insert("k", 2), Some(Variant::Int(1)));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.remove(&"k".into()), Some(Variant::Int(2)));
        assert!(dict.is_empty());
    }

    #[test]
    fn values_differing_inequal() {
        let a: Dictionary = [("a", 1)].into_iter().collect();
        let b: Dictionary = [("a", 2)].into_iter().collect();
        assert_ne!(a, b);
    }
}
