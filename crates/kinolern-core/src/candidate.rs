//! Kandidaten, die der Empfehlungsdienst für eine Runde vorschlägt.
//!
//! Außer `item_index` behandelt Kinolern alle Felder als undurchsichtige
//! Anzeige-Metadaten. Sie werden unverändert durchgereicht; die Zugriffs-
//! methoden lesen nur die bekannten Felder des Filmdatensatzes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Stabile Kennung eines Kandidaten innerhalb einer Sitzung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemIndex(pub u64);

impl fmt::Display for ItemIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for ItemIndex {
    fn from(v: u64) -> Self {
        ItemIndex(v)
    }
}

impl FromStr for ItemIndex {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ItemIndex)
    }
}

/// Ein in einer Runde angebotener Kandidat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub item_index: ItemIndex,
    /// Alle übrigen Felder der Antwort (Titel, Poster, Genres, ...).
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl Candidate {
    #[must_use]
    pub fn new(item_index: ItemIndex) -> Self {
        Self {
            item_index,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.text("title")
    }

    pub fn poster_path(&self) -> Option<&str> {
        self.text("posterPath")
    }

    pub fn genres(&self) -> Vec<&str> {
        self.text_list("genres")
    }

    pub fn actors(&self) -> Vec<&str> {
        self.text_list("actors")
    }

    pub fn directors(&self) -> Vec<&str> {
        self.text_list("directors")
    }

    pub fn languages(&self) -> Vec<&str> {
        self.text_list("languages")
    }

    pub fn trailer_ids(&self) -> Vec<&str> {
        self.text_list("youtubeTrailerIds")
    }

    /// Titel oder, falls keiner vorhanden ist, die Kennung in spitzen Klammern.
    pub fn label(&self) -> String {
        match self.title() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!("<{}>", self.item_index),
        }
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    // Der Datensatz liefert Listen entweder als Array oder als kommagetrennten
    // String; leere Einträge entstehen aus fehlenden CSV-Werten.
    fn text_list(&self, key: &str) -> Vec<&str> {
        match self.metadata.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s.split(',').filter(|s| !s.is_empty()).collect(),
            _ => Vec::new(),
        }
    }
}
