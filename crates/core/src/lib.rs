//! meshcall-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Relay und Mesh-Orchestrator
//! gemeinsam nutzen: Peer- und Raum-Identitaeten, Raum-Ereignisse und den
//! zentralen Fehlertyp.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::MeshcallError;
pub use event::RaumEreignis;
pub use types::{PeerId, RaumId};
