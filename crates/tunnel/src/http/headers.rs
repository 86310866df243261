//! Case-insensitive, insertion-ordered header map.
//!
//! Lookup is by lowercased name; emission uses the first-seen original
//! casing. Small `Vec`-backed map: per-connection header sets are never
//! large enough to need anything fancier (same call the teacher makes in
//! `crates/httpserver/src/serve/common/header.rs`).

#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String, String)>, // (lower, original, value)
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: String) {
        let lower = name.to_ascii_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.0 == lower) {
            entry.2 = value;
        } else {
            self.entries.push((lower, name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|e| e.0 == lower)
            .map(|e| e.2.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate in insertion order as (original-case name, value).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|e| (e.1.as_str(), e.2.as_str()))
    }
}
