//! Kern-Datentypen für Kinolern.
//!
//! Dieses Crate beschreibt das Austauschformat mit dem Empfehlungsdienst
//! ([`RecommendRequest`], [`RecommendResponse`]) sowie die Bausteine einer
//! Sitzung: Kandidaten, Bewertungen und abgeschlossene Runden.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod candidate;
pub mod round;

pub use candidate::{Candidate, ItemIndex};
pub use round::{chunk, Round, RoundMovies, ROW_SIZE};

/// Bewertung eines Kandidaten: -1 (Dislike), 0 (neutral/ungesetzt), 1 (Like).
///
/// Auf dem Draht als Ganzzahl kodiert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Preference {
    Dislike,
    #[default]
    Neutral,
    Like,
}

impl Preference {
    /// Alle Werte in der Reihenfolge, in der Runden sie gruppieren.
    pub const GROUPS: [Preference; 3] = [Preference::Like, Preference::Neutral, Preference::Dislike];

    #[must_use]
    pub fn value(self) -> i8 {
        match self {
            Preference::Dislike => -1,
            Preference::Neutral => 0,
            Preference::Like => 1,
        }
    }

    /// Betrag der Bewertung; Grundlage für das "dirty"-Signal einer Runde.
    #[must_use]
    pub fn magnitude(self) -> u32 {
        u32::from(self.value().unsigned_abs())
    }

    #[must_use]
    pub fn is_set(self) -> bool {
        self != Preference::Neutral
    }
}

impl From<Preference> for i8 {
    fn from(p: Preference) -> Self {
        p.value()
    }
}

impl TryFrom<i8> for Preference {
    type Error = String;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(Preference::Dislike),
            0 => Ok(Preference::Neutral),
            1 => Ok(Preference::Like),
            other => Err(format!("preference must be -1, 0 or 1, got {other}")),
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Bewertungen einer Runde, geordnet nach `ItemIndex`.
///
/// Als JSON ein Objekt mit Zeichenketten-Schlüsseln: `{"12": 1, "40": 0}`.
pub type FeedbackMap = BTreeMap<ItemIndex, Preference>;

/// Baut eine neutrale Bewertungstabelle für frisch geladene Kandidaten.
pub fn neutral_feedback<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> FeedbackMap {
    candidates
        .into_iter()
        .map(|c| (c.item_index, Preference::Neutral))
        .collect()
}

/// Anfrage an den Empfehlungsdienst.
///
/// `rounds` enthält die Bewertungen aller bisher abgeschickten Runden, `exclude`
/// die Kennungen, die nicht erneut angeboten werden dürfen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub rounds: Vec<FeedbackMap>,
    #[serde(default)]
    pub exclude: Vec<ItemIndex>,
}

/// Erfolgreiche Antwort des Empfehlungsdienstes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub candidates: Vec<Candidate>,
}
