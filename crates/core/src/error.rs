//! Fehlertypen fuer meshcall
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehlerzustaende.
//! Relay und Orchestrator definieren eigene Fehler und koennen diese
//! via `#[from]` einbetten.

use thiserror::Error;

/// Crate-uebergreifende Fehler im meshcall-System
#[derive(Debug, Error)]
pub enum MeshcallError {
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),
}

impl MeshcallError {
    /// Gibt true zurueck wenn der Fehler vom Netzwerk herruehrt
    pub fn ist_netzwerkfehler(&self) -> bool {
        matches!(self, Self::Verbindung(_) | Self::Getrennt(_))
    }
}
