//! meshcall-signaling – WebSocket Signaling-Relay
//!
//! Dieser Crate implementiert den Relay fuer meshcall. Er vergibt
//! Peer-Identitaeten, verwaltet Raeume und leitet Offer/Answer/ICE sowie
//! Chat- und Status-Nachrichten zwischen den Peers eines Raums weiter.
//! Medien laufen nie ueber den Relay.
//!
//! ## Architektur
//!
//! ```text
//! axum WebSocket-Endpunkt (SignalingServer)
//!     |
//!     v
//! PeerConnection (pro Verbindung ein Task)
//!     |  Keepalive, Timeout, Shutdown, Send-Queue
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- join           -> RaumVerzeichnis::beitreten
//!     +-- offer/answer/  -> RaumVerzeichnis::weiterleiten
//!     |   ice/peer-name
//!     +-- chat/mute/     -> weiterleiten oder broadcasten
//!     |   video
//!     +-- leave          -> RaumVerzeichnis::verlassen
//!
//! RaumVerzeichnis – Raeume, Mitglieder, Zustellung, Ereignisse
//! PeerIdVergabe   – eindeutige Peer-IDs
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod presence;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::{PeerSender, Zustellung};
pub use connection::{PeerConnection, VerbindungsEreignis};
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use ids::{IdStrategie, PeerIdVergabe};
pub use presence::RaumVerzeichnis;
pub use server_state::{
    SignalingConfig, SignalingState, DEFAULT_SEND_QUEUE_GROESSE, DEFAULT_WS_PFAD,
};
pub use ws::SignalingServer;
