//! Ereignisse an die Oberflaeche

use meshcall_core::types::PeerId;
use meshcall_protocol::ChatMessage;
use std::sync::Arc;

use crate::link::LinkZustand;
use crate::transport::RemoteStream;

/// Alles was die Oberflaeche vom Orchestrator erfaehrt
#[derive(Debug, Clone)]
pub enum MeshEreignis {
    /// Ein Peer ist dem Raum beigetreten (noch ohne Medien)
    PeerBeigetreten { peer_id: PeerId, name: String },
    /// Medien eines verbundenen Peers koennen angezeigt werden
    PeerMedien {
        peer_id: PeerId,
        stream: Arc<dyn RemoteStream>,
        name: String,
    },
    /// Ein Peer hat den Raum verlassen
    PeerVerlassen { peer_id: PeerId },
    PeerStumm { peer_id: PeerId, stumm: bool },
    PeerVideo { peer_id: PeerId, video_an: bool },
    /// Chat-Nachricht (auch das lokale Echo)
    Chat(ChatMessage),
    LinkZustand {
        peer_id: PeerId,
        zustand: LinkZustand,
    },
    /// Link wegen eines Fehlers geschlossen
    LinkGeschlossen { peer_id: PeerId, grund: String },
    /// Relay-Verbindung verloren; bestehende Links bleiben bestehen
    RelayGetrennt,
}
