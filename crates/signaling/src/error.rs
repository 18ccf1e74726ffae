//! Fehlertypen fuer den Signaling-Relay

use meshcall_core::types::RaumId;
use meshcall_protocol::ProtokollFehler;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Relay
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (Listener, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Protokollfehler (unparsebare oder unbekannte Nachricht)
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),

    /// Verbindung ist bereits einem Raum beigetreten
    #[error("Verbindung ist bereits Raum '{0}' beigetreten")]
    BereitsBeigetreten(RaumId),

    /// Raum hat die maximale Mitgliederzahl erreicht
    #[error("Raum '{0}' ist voll")]
    RaumVoll(RaumId),

    /// Relay hat die maximale Verbindungszahl erreicht
    #[error("Relay ist voll")]
    ServerVoll,

    /// Senden an Client fehlgeschlagen (Queue geschlossen)
    #[error("Senden fehlgeschlagen")]
    SendFehler,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Relay
pub type SignalingResult<T> = Result<T, SignalingError>;
