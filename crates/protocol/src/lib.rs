//! meshcall-protocol – Signaling-Protokoll-Definitionen
//!
//! Dieses Crate definiert die geschlossene Menge aller Nachrichten, die
//! zwischen Browser/Client und Relay ueber die WebSocket-Verbindung
//! ausgetauscht werden, sowie das JSON-Wire-Format.

pub mod message;
pub mod wire;

pub use message::{ChatMessage, IceCandidate, PeerInfo, SdpTyp, SessionDescription, SignalMessage};
pub use wire::{dekodieren, kodieren, ProtokollFehler};
