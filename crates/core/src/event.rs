//! Raum-Ereignisse
//!
//! Der Relay veroeffentlicht jede Aenderung der Raum-Mitgliedschaft als
//! `RaumEreignis` auf einem Broadcast-Kanal. Beobachter (Metriken, Tests)
//! abonnieren diese Ereignisse, ohne den Raum-Zustand selbst zu sperren.

use crate::types::{PeerId, RaumId};
use serde::{Deserialize, Serialize};

/// Alle Aenderungen am Raum-Verzeichnis des Relays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaumEreignis {
    /// Ein Raum wurde beim ersten Beitritt angelegt
    RaumErstellt { raum_id: RaumId },
    /// Ein Peer ist einem Raum beigetreten
    PeerBeigetreten {
        raum_id: RaumId,
        peer_id: PeerId,
        name: String,
    },
    /// Ein Peer hat einen Raum verlassen (explizit oder durch Verbindungsabbruch)
    PeerVerlassen { raum_id: RaumId, peer_id: PeerId },
    /// Der letzte Peer ist gegangen, der Raum wurde entfernt
    RaumEntfernt { raum_id: RaumId },
}

impl RaumEreignis {
    /// Gibt den betroffenen Raum zurueck
    pub fn raum_id(&self) -> &RaumId {
        match self {
            Self::RaumErstellt { raum_id }
            | Self::PeerBeigetreten { raum_id, .. }
            | Self::PeerVerlassen { raum_id, .. }
            | Self::RaumEntfernt { raum_id } => raum_id,
        }
    }
}
