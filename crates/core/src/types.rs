//! Gemeinsame Identifikationstypen fuer meshcall
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Peer- und Raum-Kennungen zur Compilezeit auszuschliessen. Auf dem Draht
//! sind beide einfache JSON-Strings (`#[serde(transparent)]`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Praefix aller vom Relay vergebenen Peer-IDs
pub const PEER_ID_PRAEFIX: &str = "peer-";

/// Vom Relay vergebene Peer-Identitaet
///
/// Eindeutig fuer die Lebensdauer des Relay-Prozesses, wird nie
/// wiederverwendet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Erstellt eine sequenzielle Peer-ID (`peer-<n>`)
    pub fn sequenziell(n: u64) -> Self {
        Self(format!("{PEER_ID_PRAEFIX}{n}"))
    }

    /// Erstellt eine zufaellige, nicht erratbare Peer-ID (`peer-<uuid>`)
    pub fn zufaellig() -> Self {
        Self(format!("{PEER_ID_PRAEFIX}{}", Uuid::new_v4().simple()))
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opake Raum-Kennung (vom Client gewaehlt, z.B. die Meeting-ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaumId(pub String);

impl RaumId {
    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RaumId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RaumId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for RaumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequenzielle_peer_id_format() {
        assert_eq!(PeerId::sequenziell(1).as_str(), "peer-1");
        assert_eq!(PeerId::sequenziell(42).to_string(), "peer-42");
    }

    #[test]
    fn zufaellige_peer_ids_eindeutig() {
        let a = PeerId::zufaellig();
        let b = PeerId::zufaellig();
        assert_ne!(a, b, "Zwei zufaellige PeerIds muessen verschieden sein");
        assert!(a.as_str().starts_with(PEER_ID_PRAEFIX));
    }

    #[test]
    fn ids_sind_transparente_strings() {
        let pid = PeerId::from("peer-7");
        assert_eq!(serde_json::to_string(&pid).unwrap(), "\"peer-7\"");

        let raum: RaumId = serde_json::from_str("\"R1\"").unwrap();
        assert_eq!(raum, RaumId::from("R1"));
    }
}
