//! Vergabe von Peer-Identitaeten
//!
//! Jede Identitaet ist fuer die Lebensdauer des Relay-Prozesses eindeutig
//! und wird nie wiederverwendet. Zwei Strategien:
//! - `Sequenziell`: `peer-1`, `peer-2`, ... (Atomic-Zaehler pro Prozess)
//! - `Zufaellig`: `peer-<uuid>` (verraet weder Beitrittsreihenfolge noch
//!   Raumgroesse)

use meshcall_core::types::PeerId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Strategie fuer die Peer-ID-Vergabe
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategie {
    /// Fortlaufende Nummern
    #[default]
    Sequenziell,
    /// Zufaellige UUID
    Zufaellig,
}

/// Thread-safe Vergabe eindeutiger Peer-IDs
#[derive(Debug)]
pub struct PeerIdVergabe {
    strategie: IdStrategie,
    zaehler: AtomicU64,
}

impl PeerIdVergabe {
    /// Erstellt eine neue Vergabe mit der gegebenen Strategie
    pub fn neu(strategie: IdStrategie) -> Self {
        Self {
            strategie,
            zaehler: AtomicU64::new(0),
        }
    }

    /// Vergibt die naechste Peer-ID
    pub fn naechste(&self) -> PeerId {
        match self.strategie {
            IdStrategie::Sequenziell => {
                let n = self.zaehler.fetch_add(1, Ordering::Relaxed) + 1;
                PeerId::sequenziell(n)
            }
            IdStrategie::Zufaellig => PeerId::zufaellig(),
        }
    }

    /// Gibt die konfigurierte Strategie zurueck
    pub fn strategie(&self) -> IdStrategie {
        self.strategie
    }
}

impl Default for PeerIdVergabe {
    fn default() -> Self {
        Self::neu(IdStrategie::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn sequenziell_beginnt_bei_eins() {
        let vergabe = PeerIdVergabe::neu(IdStrategie::Sequenziell);
        assert_eq!(vergabe.naechste().as_str(), "peer-1");
        assert_eq!(vergabe.naechste().as_str(), "peer-2");
    }

    #[test]
    fn zufaellig_nicht_fortlaufend() {
        let vergabe = PeerIdVergabe::neu(IdStrategie::Zufaellig);
        let a = vergabe.naechste();
        assert_ne!(a.as_str(), "peer-1");
        assert_ne!(a, vergabe.naechste());
    }

    #[test]
    fn parallele_vergabe_ohne_duplikate() {
        let vergabe = Arc::new(PeerIdVergabe::neu(IdStrategie::Sequenziell));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let v = Arc::clone(&vergabe);
                std::thread::spawn(move || (0..100).map(|_| v.naechste()).collect::<Vec<_>>())
            })
            .collect();

        let mut alle = HashSet::new();
        for t in threads {
            for id in t.join().unwrap() {
                assert!(alle.insert(id), "Peer-ID doppelt vergeben");
            }
        }
        assert_eq!(alle.len(), 800);
    }

    #[test]
    fn strategie_serde() {
        let s: IdStrategie = serde_json::from_str("\"zufaellig\"").unwrap();
        assert_eq!(s, IdStrategie::Zufaellig);
    }
}
