//! Historique borné par mode décodeur : FIFO de 100 entrées, création
//! paresseuse au premier message d'un mode inconnu, durée de vie = process.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};

pub const RING_BUFFER_SIZE: usize = 100;

#[derive(Debug)]
pub struct RingBufferStore {
    buffers: HashMap<String, VecDeque<Value>>,
    capacity: usize,
}

impl RingBufferStore {
    pub fn new() -> Self {
        Self::with_capacity(RING_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            capacity,
        }
    }

    /// Ajoute en queue du buffer du mode (créé si absent) ; au-delà de la
    /// capacité, l'entrée la plus ancienne est évincée en tête.
    pub fn push(&mut self, mode: &str, record: Value) {
        let buf = self
            .buffers
            .entry(mode.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity + 1));
        buf.push_back(record);
        if buf.len() > self.capacity {
            buf.pop_front();
        }
    }

    /// Les `n` derniers enregistrements, du plus récent au plus ancien.
    /// Mode inconnu ou buffer vide → vec vide. Ne modifie rien.
    pub fn last_n(&self, mode: &str, n: usize) -> Vec<Value> {
        match self.buffers.get(mode) {
            Some(buf) => buf.iter().rev().take(n).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, mode: &str) -> bool {
        self.buffers.contains_key(mode)
    }

    /// Modes connus, triés pour un affichage stable.
    pub fn modes(&self) -> Vec<String> {
        let mut modes: Vec<String> = self.buffers.keys().cloned().collect();
        modes.sort();
        modes
    }
}

impl Default for RingBufferStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_n_returns_newest_first() {
        let mut store = RingBufferStore::new();
        for i in 0..5 {
            store.push("FT8", json!({ "seq": i }));
        }
        let last = store.last_n("FT8", 2);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0]["seq"], 4);
        assert_eq!(last[1]["seq"], 3);
        // min(n, k) quand on demande plus que le contenu
        assert_eq!(store.last_n("FT8", 50).len(), 5);
    }

    #[test]
    fn unknown_mode_yields_empty() {
        let store = RingBufferStore::new();
        assert!(store.last_n("ADSB", 10).is_empty());
        assert!(!store.contains("ADSB"));
    }

    #[test]
    fn eviction_is_pure_fifo() {
        let mut store = RingBufferStore::with_capacity(3);
        for i in 0..4 {
            store.push("AIS", json!({ "seq": i }));
        }
        let all = store.last_n("AIS", 10);
        assert_eq!(all.len(), 3);
        // seq 0 évincé, le plus récent en premier
        assert_eq!(all[0]["seq"], 3);
        assert_eq!(all[2]["seq"], 1);
    }

    #[test]
    fn capacity_holds_at_full_size() {
        let mut store = RingBufferStore::new();
        for i in 0..(RING_BUFFER_SIZE + 1) {
            store.push("APRS", json!({ "seq": i }));
        }
        let all = store.last_n("APRS", RING_BUFFER_SIZE + 10);
        assert_eq!(all.len(), RING_BUFFER_SIZE);
        // la toute première entrée n'est plus récupérable
        assert!(all.iter().all(|r| r["seq"] != 0));
    }

    #[test]
    fn modes_are_listed_sorted() {
        let mut store = RingBufferStore::new();
        store.push("VDL2", json!({}));
        store.push("ADSB", json!({}));
        assert_eq!(store.modes(), vec!["ADSB".to_string(), "VDL2".to_string()]);
    }
}
