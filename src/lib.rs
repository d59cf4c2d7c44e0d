mod data;
pub mod feedback;
pub mod presenter;
pub mod workflow;

pub use data::{GlossaryEntry, TERM_CATEGORIES};

use data::GLOSSARY;

/// Read-only access to the embedded glossary dictionary.
pub struct GlossaryIndex;

impl GlossaryIndex {
    /// Returns the entry for an exact key match.
    pub fn get(key: &str) -> Option<&'static GlossaryEntry> {
        GLOSSARY.get(key)
    }

    /// Returns every entry tagged with `category`, in dictionary order.
    pub fn by_category(category: &str) -> Vec<(&'static str, &'static GlossaryEntry)> {
        GLOSSARY
            .iter()
            .filter(|(_, entry)| entry.category == category)
            .collect()
    }

    /// Returns entries whose term or definition contains `keyword`,
    /// case-insensitively. No ranking; matches keep dictionary order.
    pub fn search(keyword: &str) -> Vec<(&'static str, &'static GlossaryEntry)> {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        GLOSSARY
            .iter()
            .filter(|(_, entry)| {
                entry.term.to_lowercase().contains(&needle)
                    || entry.definition.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Iterates over every `(key, entry)` pair in dictionary order.
    pub fn entries() -> impl Iterator<Item = (&'static str, &'static GlossaryEntry)> {
        GLOSSARY.iter()
    }

    pub fn keys() -> impl Iterator<Item = &'static str> {
        GLOSSARY.iter().map(|(key, _)| key)
    }

    pub fn len() -> usize {
        GLOSSARY.len()
    }

    pub fn is_empty() -> bool {
        GLOSSARY.len() == 0
    }
}
