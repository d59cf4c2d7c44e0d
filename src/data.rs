use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static GLOSSARY_JSON: &str = include_str!("../data/glossary.json");

pub(crate) static GLOSSARY: Lazy<GlossaryData> =
    Lazy::new(|| GlossaryData::from_json(GLOSSARY_JSON).expect("valid embedded glossary data"));

/// Categories every embedded entry must belong to.
pub const TERM_CATEGORIES: &[&str] = &[
    "fundamental",
    "internal-dosimetry",
    "units",
    "protection",
    "instrumentation",
];

/// One glossary definition. Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
    pub category: String,
    /// Keys of related entries. A key that resolves to nothing is skipped at
    /// render time, not treated as an error.
    #[serde(default)]
    pub related_terms: Vec<String>,
    #[serde(default)]
    pub references: Option<String>,
}

#[derive(Deserialize)]
struct RawEntry {
    key: String,
    #[serde(flatten)]
    entry: GlossaryEntry,
}

/// The parsed dictionary. Entries keep the order they appear in the source
/// file, which is the order `by_category` and `search` report matches in.
pub(crate) struct GlossaryData {
    entries: Vec<(String, GlossaryEntry)>,
    index: HashMap<String, usize>,
}

impl GlossaryData {
    fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let raw_entries: Vec<RawEntry> = serde_json::from_str(raw)?;
        let mut entries = Vec::with_capacity(raw_entries.len());
        let mut index = HashMap::with_capacity(raw_entries.len());
        for raw in raw_entries {
            index.insert(raw.key.clone(), entries.len());
            entries.push((raw.key, raw.entry));
        }
        Ok(Self { entries, index })
    }

    pub(crate) fn get(&self, key: &str) -> Option<&GlossaryEntry> {
        self.index.get(key).map(|&at| &self.entries[at].1)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &GlossaryEntry)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
