//! Abgeschlossene Runden und die Zeilenaufteilung für die Anzeige.

use crate::{Candidate, FeedbackMap, Preference};
use serde::{Deserialize, Serialize};

/// Anzahl Kandidaten pro Anzeigezeile.
pub const ROW_SIZE: usize = 5;

/// Eine abgeschlossene Runde: Nummer (ab 1) und die Kandidaten gruppiert nach
/// ihrer endgültigen Bewertung.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub number: u32,
    pub movies: RoundMovies,
}

impl Round {
    #[must_use]
    pub fn new(number: u32, candidates: &[Candidate], feedback: &FeedbackMap) -> Self {
        Self {
            number,
            movies: RoundMovies::partition(candidates, feedback),
        }
    }
}

/// Kandidaten einer Runde, aufgeteilt in die Gruppen `"1"`, `"0"` und `"-1"`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoundMovies {
    #[serde(rename = "1")]
    pub liked: Vec<Candidate>,
    #[serde(rename = "0")]
    pub neutral: Vec<Candidate>,
    #[serde(rename = "-1")]
    pub disliked: Vec<Candidate>,
}

impl RoundMovies {
    /// Teilt `candidates` nach ihrer Bewertung auf; die Reihenfolge innerhalb
    /// einer Gruppe bleibt erhalten. Fehlt eine Bewertung, zählt sie als neutral.
    #[must_use]
    pub fn partition(candidates: &[Candidate], feedback: &FeedbackMap) -> Self {
        let mut movies = RoundMovies::default();
        for cand in candidates {
            let pref = feedback.get(&cand.item_index).copied().unwrap_or_default();
            movies.group_mut(pref).push(cand.clone());
        }
        movies
    }

    #[must_use]
    pub fn group(&self, pref: Preference) -> &[Candidate] {
        match pref {
            Preference::Like => &self.liked,
            Preference::Neutral => &self.neutral,
            Preference::Dislike => &self.disliked,
        }
    }

    fn group_mut(&mut self, pref: Preference) -> &mut Vec<Candidate> {
        match pref {
            Preference::Like => &mut self.liked,
            Preference::Neutral => &mut self.neutral,
            Preference::Dislike => &mut self.disliked,
        }
    }

    pub fn len(&self) -> usize {
        self.liked.len() + self.neutral.len() + self.disliked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Teilt `items` in Zeilen zu je `size` Elementen; die letzte Zeile darf kürzer sein.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemIndex;
    use serde_json::json;

    #[test]
    fn partition_keeps_order_within_groups() {
        let cands: Vec<Candidate> = (1..=4).map(|i| Candidate::new(ItemIndex(i))).collect();
        let mut fb = FeedbackMap::new();
        fb.insert(ItemIndex(1), Preference::Like);
        fb.insert(ItemIndex(2), Preference::Neutral);
        fb.insert(ItemIndex(3), Preference::Like);
        fb.insert(ItemIndex(4), Preference::Dislike);

        let movies = RoundMovies::partition(&cands, &fb);
        let liked: Vec<u64> = movies.liked.iter().map(|c| c.item_index.0).collect();
        assert_eq!(liked, vec![1, 3]);
        assert_eq!(movies.group(Preference::Neutral).len(), 1);
        assert_eq!(movies.group(Preference::Dislike)[0].item_index, ItemIndex(4));
        assert_eq!(movies.len(), 4);
    }

    #[test]
    fn round_serializes_with_numeric_group_keys() {
        let cands = vec![Candidate::new(ItemIndex(1)), Candidate::new(ItemIndex(2))];
        let mut fb = FeedbackMap::new();
        fb.insert(ItemIndex(1), Preference::Like);
        fb.insert(ItemIndex(2), Preference::Neutral);

        let round = Round::new(1, &cands, &fb);
        assert_eq!(
            serde_json::to_value(&round).unwrap(),
            json!({
                "number": 1,
                "movies": {
                    "1": [{"item_index": 1}],
                    "0": [{"item_index": 2}],
                    "-1": []
                }
            })
        );
    }

    #[test]
    fn chunk_splits_into_rows_of_five() {
        let items: Vec<u32> = (0..12).collect();
        let rows = chunk(&items, ROW_SIZE);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 5);
        assert_eq!(rows[2], vec![10, 11]);
        assert!(chunk::<u32>(&[], ROW_SIZE).is_empty());
    }
}
