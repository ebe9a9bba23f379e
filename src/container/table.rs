//! Name/value table used for request headers and response fields.
//!
//! Lookups are a linear scan; each entry caches a cheap additive hash of its
//! name so most mismatches are rejected without a string compare. Names are
//! case-sensitive. The HTTP parser lower-cases request header names before
//! inserting them.

#[derive(Debug, Clone)]
struct TableEntry {
    hash: u16,
    name: String,
    value: String,
}

#[derive(Debug, Clone, Default)]
pub struct NameValueTable {
    entries: Vec<TableEntry>,
}

fn name_hash(name: &str) -> u16 {
    name.bytes().fold(0u16, |acc, b| acc.wrapping_add(b as u16))
}

impl NameValueTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn position(&self, name: &str) -> Option<usize> {
        let hash = name_hash(name);
        self.entries
            .iter()
            .position(|e| e.hash == hash && e.name == name)
    }

    /// Sets `name` to `value`, replacing an existing value.
    ///
    /// `None` removes the entry. Returns the previous value.
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Option<String> {
        match (self.position(name), value) {
            (Some(idx), Some(value)) => {
                Some(std::mem::replace(&mut self.entries[idx].value, value.to_string()))
            }
            (Some(idx), None) => Some(self.entries.remove(idx).value),
            (None, Some(value)) => {
                self.entries.push(TableEntry {
                    hash: name_hash(name),
                    name: name.to_string(),
                    value: value.to_string(),
                });
                None
            }
            (None, None) => None,
        }
    }

    /// Shorthand for `set(name, Some(value))`.
    pub fn insert(&mut self, name: &str, value: &str) -> Option<String> {
        self.set(name, Some(value))
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.set(name, None)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].value.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_str()))
    }
}
