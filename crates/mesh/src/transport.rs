//! Schnittstelle zum Direkt-Transport (WebRTC o.ae.)
//!
//! Der Orchestrator kennt nur diese Traits. Ein Adapter erzeugt pro
//! Remote-Peer einen `PeerTransport` und meldet alles was asynchron
//! passiert (lokale Kandidaten, Verbindungsstatus, Remote-Stream,
//! Datenkanal) als `TransportEreignis` ueber einen Kanal zurueck.
//!
//! Jedes Ereignis traegt Peer-ID und Link-Generation. Ersetzt ein neues
//! Offer einen Link, werden spaete Ereignisse des alten Transports an der
//! Generation erkannt und verworfen.

use async_trait::async_trait;
use meshcall_core::types::PeerId;
use meshcall_protocol::{IceCandidate, SessionDescription};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::IceServer;
use crate::error::MeshResult;
use crate::media::MedienSpur;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Medienstrom eines Remote-Peers (fuer die Anzeige)
pub trait RemoteStream: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
}

/// Datenkanal zu einem Remote-Peer
pub trait DatenKanal: Send + Sync + fmt::Debug {
    fn label(&self) -> &str;
    fn ist_offen(&self) -> bool;
    fn senden(&self, text: &str) -> MeshResult<()>;
    fn schliessen(&self);
}

/// Direkte Verbindung zu genau einem Remote-Peer
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Haengt die lokalen Spuren an (lesend)
    async fn lokale_medien_anhaengen(&self, spuren: &[Arc<dyn MedienSpur>]) -> MeshResult<()>;
    /// Oeffnet einen Datenkanal (Initiator-Seite)
    async fn datenkanal_oeffnen(&self, label: &str) -> MeshResult<Arc<dyn DatenKanal>>;
    /// Erzeugt ein Offer und setzt es als lokale Beschreibung
    async fn angebot_erstellen(&self) -> MeshResult<SessionDescription>;
    /// Erzeugt ein Answer und setzt es als lokale Beschreibung
    async fn antwort_erstellen(&self) -> MeshResult<SessionDescription>;
    /// Setzt die Beschreibung der Gegenseite
    async fn remote_setzen(&self, beschreibung: SessionDescription) -> MeshResult<()>;
    /// Wendet einen Kandidaten der Gegenseite an
    async fn kandidat_hinzufuegen(&self, kandidat: IceCandidate) -> MeshResult<()>;
    /// Schliesst die Verbindung (idempotent)
    async fn schliessen(&self);
}

/// Erzeugt Transports fuer neue Links
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    async fn transport_erstellen(
        &self,
        peer_id: &PeerId,
        ice_server: &[IceServer],
        ereignisse: TransportMelder,
    ) -> MeshResult<Arc<dyn PeerTransport>>;
}

// ---------------------------------------------------------------------------
// Ereignisse
// ---------------------------------------------------------------------------

/// Was ein Transport asynchron meldet
#[derive(Debug, Clone)]
pub enum TransportEreignisArt {
    /// Lokaler ICE-Kandidat, muss an die Gegenseite
    LokalerKandidat(IceCandidate),
    /// Direktverbindung steht
    Verbunden,
    /// Verbindung unterbrochen (kann sich erholen)
    Getrennt,
    /// Verbindung endgueltig gescheitert
    Fehlgeschlagen,
    /// Medienstrom der Gegenseite bekannt
    RemoteStream(Arc<dyn RemoteStream>),
    /// Gegenseite hat einen Datenkanal geoeffnet
    Datenkanal(Arc<dyn DatenKanal>),
    /// Textnachricht auf einem Datenkanal
    DatenkanalNachricht(String),
}

/// Ereignis eines Transports, zugeordnet zu Peer und Link-Generation
#[derive(Debug, Clone)]
pub struct TransportEreignis {
    pub peer_id: PeerId,
    pub generation: u64,
    pub art: TransportEreignisArt,
}

/// Sender den ein Transport fuer seine Ereignisse bekommt
#[derive(Debug, Clone)]
pub struct TransportMelder {
    peer_id: PeerId,
    generation: u64,
    tx: mpsc::UnboundedSender<TransportEreignis>,
}

impl TransportMelder {
    pub fn neu(peer_id: PeerId, generation: u64, tx: mpsc::UnboundedSender<TransportEreignis>) -> Self {
        Self {
            peer_id,
            generation,
            tx,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Meldet ein Ereignis; `false` wenn der Orchestrator nicht mehr lauscht
    pub fn melden(&self, art: TransportEreignisArt) -> bool {
        self.tx
            .send(TransportEreignis {
                peer_id: self.peer_id.clone(),
                generation: self.generation,
                art,
            })
            .is_ok()
    }
}
