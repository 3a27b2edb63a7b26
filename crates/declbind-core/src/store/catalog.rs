//! Signature catalog: the persisted record of every generated symbol.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One catalog record. Serialized without a tag, so the JSON shape alone
/// tells the kinds apart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureEntry {
    Function { name: String, arg: String, ret: String },
    Constant { name: String, value: String },
    Class { name: String },
}

impl SignatureEntry {
    pub fn name(&self) -> &str {
        match self {
            SignatureEntry::Function { name, .. }
            | SignatureEntry::Constant { name, .. }
            | SignatureEntry::Class { name } => name,
        }
    }
}

/// Native qualified symbol -> distinct entries in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureCatalog {
    entries: BTreeMap<String, Vec<SignatureEntry>>,
}

impl SignatureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entry` under `symbol`. Returns `false` if it was already there.
    pub fn record(&mut self, symbol: &str, entry: SignatureEntry) -> bool {
        let list = self.entries.entry(symbol.to_string()).or_default();
        if list.contains(&entry) {
            return false;
        }
        list.push(entry);
        true
    }

    pub fn get(&self, symbol: &str) -> Option<&[SignatureEntry]> {
        self.entries.get(symbol).map(Vec::as_slice)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
