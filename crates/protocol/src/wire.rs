//! Wire-Format fuer WebSocket-Verbindungen
//!
//! Jede Signaling-Nachricht ist genau ein WebSocket-Textframe mit einem
//! JSON-Objekt. Das Feld `type` bestimmt die Nachrichtenart.
//!
//! ```text
//! {"type":"offer","to":"peer-2","offer":{"type":"offer","sdp":"v=0..."}}
//! ```
//!
//! Die Validierung passiert hier an der Grenze: unparsebare Frames und
//! unbekannte Typen werden als `ProtokollFehler` gemeldet, damit der
//! Empfaenger sie protokollieren und verwerfen kann.

use serde::Deserialize;
use thiserror::Error;

use crate::message::SignalMessage;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Nachrichtengroesse (64 KB – SDPs sind selten > 10 KB)
pub const DEFAULT_MAX_NACHRICHT_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler beim Dekodieren/Kodieren einer Signaling-Nachricht
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Frame ist kein gueltiges JSON oder passt zu keiner Nachrichtenart
    #[error("Ungueltige Nachricht: {0}")]
    Ungueltig(#[from] serde_json::Error),

    /// Gueltiges JSON, aber unbekannter Nachrichtentyp
    #[error("Unbekannter Nachrichtentyp: '{0}'")]
    UnbekannteArt(String),

    /// Nachricht ueberschreitet die erlaubte Groesse
    #[error("Nachricht zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { groesse: usize, maximum: usize },
}

/// Minimaler Kopf um bei unbekannten Typen den Typnamen zu protokollieren
#[derive(Deserialize, Default)]
struct Kopf {
    #[serde(rename = "type", default)]
    art: Option<String>,
}

// ---------------------------------------------------------------------------
// Kodieren / Dekodieren
// ---------------------------------------------------------------------------

/// Dekodiert einen Textframe in eine `SignalMessage`
///
/// # Fehler
/// - `Ungueltig` bei kaputtem JSON, fehlendem `type` oder fehlenden Pflichtfeldern
/// - `UnbekannteArt` bei einem Typ ausserhalb des Protokolls
pub fn dekodieren(text: &str) -> Result<SignalMessage, ProtokollFehler> {
    let nachricht: SignalMessage = serde_json::from_str(text)?;
    if let SignalMessage::Unknown = nachricht {
        let kopf: Kopf = serde_json::from_str(text).unwrap_or_default();
        return Err(ProtokollFehler::UnbekannteArt(kopf.art.unwrap_or_default()));
    }
    Ok(nachricht)
}

/// Dekodiert einen Textframe und prueft vorher die Groesse
pub fn dekodieren_mit_limit(text: &str, maximum: usize) -> Result<SignalMessage, ProtokollFehler> {
    if text.len() > maximum {
        return Err(ProtokollFehler::ZuGross {
            groesse: text.len(),
            maximum,
        });
    }
    dekodieren(text)
}

/// Kodiert eine `SignalMessage` als JSON-Textframe
pub fn kodieren(nachricht: &SignalMessage) -> Result<String, ProtokollFehler> {
    Ok(serde_json::to_string(nachricht)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use meshcall_core::types::PeerId;

    #[test]
    fn dekodieren_gueltige_nachricht() {
        let msg = dekodieren(r#"{"type":"peer-left","peerId":"peer-1"}"#).unwrap();
        assert_eq!(
            msg,
            SignalMessage::PeerLeft {
                peer_id: PeerId::sequenziell(1)
            }
        );
    }

    #[test]
    fn dekodieren_kaputtes_json() {
        let result = dekodieren("{nicht json");
        assert!(matches!(result, Err(ProtokollFehler::Ungueltig(_))));
    }

    #[test]
    fn dekodieren_fehlendes_pflichtfeld() {
        // `offer` ohne Description
        let result = dekodieren(r#"{"type":"offer","to":"peer-2"}"#);
        assert!(matches!(result, Err(ProtokollFehler::Ungueltig(_))));
    }

    #[test]
    fn dekodieren_ohne_typ() {
        let result = dekodieren(r#"{"roomId":"R1"}"#);
        assert!(matches!(result, Err(ProtokollFehler::Ungueltig(_))));
    }

    #[test]
    fn dekodieren_unbekannter_typ_nennt_typnamen() {
        match dekodieren(r#"{"type":"renegotiate"}"#) {
            Err(ProtokollFehler::UnbekannteArt(art)) => assert_eq!(art, "renegotiate"),
            other => panic!("Erwartet UnbekannteArt, erhalten: {other:?}"),
        }
    }

    #[test]
    fn dekodieren_mit_limit_lehnt_grosse_frames_ab() {
        let text = format!(r#"{{"type":"chat","sender":"A","text":"{}","time":"10:00"}}"#, "x".repeat(200));
        let result = dekodieren_mit_limit(&text, 100);
        assert!(matches!(result, Err(ProtokollFehler::ZuGross { maximum: 100, .. })));
        assert!(dekodieren_mit_limit(&text, DEFAULT_MAX_NACHRICHT_BYTES).is_ok());
    }

    #[test]
    fn kodieren_erzeugt_textframe() {
        let text = kodieren(&SignalMessage::Id {
            id: PeerId::sequenziell(1),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"id","id":"peer-1"}"#);
    }
}
