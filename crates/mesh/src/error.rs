//! Fehlertypen fuer den Mesh-Orchestrator

use meshcall_core::types::PeerId;
use meshcall_core::MeshcallError;
use meshcall_protocol::ProtokollFehler;
use thiserror::Error;

use crate::link::LinkZustand;

/// Fehlertyp fuer den Mesh-Orchestrator
#[derive(Debug, Error)]
pub enum MeshError {
    /// Lokale Medien konnten nicht erfasst werden (fatal fuer `start`)
    #[error("Medienerfassung fehlgeschlagen: {0}")]
    Medien(String),

    /// Relay-Verbindung fehlgeschlagen oder verloren
    #[error("Relay-Fehler: {0}")]
    Relay(#[from] MeshcallError),

    /// Verhandlung mit einem einzelnen Peer fehlgeschlagen
    #[error("Verhandlung mit {peer_id} fehlgeschlagen: {grund}")]
    Verhandlung { peer_id: PeerId, grund: String },

    /// Link-Zustand darf nicht zurueckgehen
    #[error("Ungueltiger Zustandsuebergang: {von:?} -> {nach:?}")]
    Zustandsuebergang { von: LinkZustand, nach: LinkZustand },

    /// Fehler im Transport-Adapter
    #[error("Transport-Fehler: {0}")]
    Transport(String),

    /// Operation passt nicht zum Sitzungszustand
    #[error("Sitzungsfehler: {0}")]
    Sitzung(String),

    /// Protokollfehler (Kodieren/Dekodieren)
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),
}

impl MeshError {
    /// Erstellt einen Transport-Fehler
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Erstellt einen Sitzungsfehler
    pub fn sitzung(msg: impl Into<String>) -> Self {
        Self::Sitzung(msg.into())
    }

    /// Ordnet einen Fehler einem Peer zu
    pub fn fuer_peer(self, peer_id: &PeerId) -> Self {
        match self {
            e @ Self::Verhandlung { .. } => e,
            andere => Self::Verhandlung {
                peer_id: peer_id.clone(),
                grund: andere.to_string(),
            },
        }
    }
}

/// Result-Typ fuer den Mesh-Orchestrator
pub type MeshResult<T> = Result<T, MeshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuer_peer_ordnet_zu() {
        let e = MeshError::transport("sdp kaputt").fuer_peer(&PeerId::sequenziell(3));
        assert_eq!(
            e.to_string(),
            "Verhandlung mit peer-3 fehlgeschlagen: Transport-Fehler: sdp kaputt"
        );
    }

    #[test]
    fn relay_fehler_aus_core() {
        let e: MeshError = MeshcallError::Verbindung("abgelehnt".into()).into();
        assert!(matches!(e, MeshError::Relay(ref inner) if inner.ist_netzwerkfehler()));
    }
}
