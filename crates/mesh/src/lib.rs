//! meshcall-mesh – Client-seitiger Peer-Mesh-Orchestrator
//!
//! Jeder Teilnehmer haelt eine Direktverbindung zu jedem anderen Peer im
//! Raum. Dieser Crate fuehrt die Verhandlung dieser Verbindungen ueber den
//! Signaling-Relay und meldet alles Sichtbare als `MeshEreignis`.
//!
//! ## Architektur
//!
//! ```text
//! MeshOrchestrator
//!     |
//!     +-- MedienErfassung      (lokale Spuren, einmal pro Sitzung)
//!     +-- ZugangsdatenQuelle   (STUN/TURN)
//!     +-- RelayVerbinder       (WebSocket zum Relay)
//!     +-- TransportAdapter     (ein PeerTransport pro Remote-Peer)
//!     |
//!     +-- RemotePeerLink x N   (Idle -> Connecting -> Negotiated -> Connected -> Closed)
//! ```
//!
//! Geraete und Direkt-Transport sind Traits; `speicher` liefert
//! In-Memory-Implementierungen fuer Tests.

pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod link;
pub mod media;
pub mod orchestrator;
pub mod relay;
pub mod speicher;
pub mod transport;

// Bequeme Re-Exporte
pub use config::{IceServer, MeshConfig};
pub use credentials::{StatischeZugangsdaten, ZugangsdatenQuelle};
pub use error::{MeshError, MeshResult};
pub use events::MeshEreignis;
pub use link::{LinkZustand, RemotePeerLink};
pub use media::{LokaleMedien, MedienErfassung, MedienSpur, SpurArt};
pub use orchestrator::{Eingabe, MeshAdapter, MeshBefehl, MeshHandle, MeshOrchestrator};
pub use relay::{RelayVerbinder, RelayVerbindung, WebSocketVerbinder};
pub use transport::{
    DatenKanal, PeerTransport, RemoteStream, TransportAdapter, TransportEreignis,
    TransportEreignisArt, TransportMelder,
};
