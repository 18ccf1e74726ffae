//! Signaling-Nachrichten (WebSocket, JSON)
//!
//! Definiert alle Nachrichten die ueber die Relay-Verbindung zwischen
//! Client und Relay ausgetauscht werden.
//!
//! ## Design
//! - Tagged Enum ueber das Feld `type` (kebab-case: `new-peer`, `peer-left`, ...)
//! - Adressierte Nachrichten tragen `to` (Client -> Relay); der Relay setzt
//!   beim Weiterleiten `from` auf die Identitaet des Absenders
//! - Unbekannte Nachrichtentypen landen in `SignalMessage::Unknown` und
//!   werden vom Empfaenger als No-Op behandelt

use meshcall_core::types::{PeerId, RaumId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Nutzdaten
// ---------------------------------------------------------------------------

/// Typ einer Session-Description (SDP)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpTyp {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Session-Description wie sie der Browser erzeugt (`{type, sdp}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub typ: SdpTyp,
    pub sdp: String,
}

impl SessionDescription {
    /// Erstellt ein Offer
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            typ: SdpTyp::Offer,
            sdp: sdp.into(),
        }
    }

    /// Erstellt ein Answer
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            typ: SdpTyp::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE-Kandidat (Trickle-ICE)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Erstellt einen Kandidaten ohne Media-Zuordnung
    pub fn neu(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }
}

/// Eintrag der Mitgliederliste (`peers`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(rename = "peerId")]
    pub peer_id: PeerId,
    pub name: String,
}

/// Chat-Nachricht (ueber Datenkanal oder Relay)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Anzeigename des Absenders
    pub sender: String,
    pub text: String,
    /// Lokale Uhrzeit des Absenders (`HH:MM`)
    pub time: String,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: SignalMessage
// ---------------------------------------------------------------------------

/// Alle Signaling-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    /// Raum beitreten (Client -> Relay)
    Join {
        #[serde(rename = "roomId")]
        room_id: RaumId,
        #[serde(default)]
        name: String,
    },
    /// Zugewiesene Identitaet (Relay -> Client)
    Id { id: PeerId },
    /// Bestehende Mitglieder (Relay -> Beitretender)
    Peers { peers: Vec<PeerInfo> },
    /// Neuer Peer im Raum (Relay -> bestehende Mitglieder)
    NewPeer {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        name: String,
    },
    /// Anzeigename an einen Peer mitteilen (weitergeleitet)
    PeerName {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        name: String,
    },
    /// SDP-Offer (weitergeleitet)
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        offer: SessionDescription,
    },
    /// SDP-Answer (weitergeleitet)
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        answer: SessionDescription,
    },
    /// ICE-Kandidat (weitergeleitet)
    Ice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        candidate: IceCandidate,
    },
    /// Chat-Nachricht (adressiert oder an alle)
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        sender: String,
        text: String,
        time: String,
    },
    /// Mikrofon-Status (an alle)
    Mute {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        muted: bool,
    },
    /// Kamera-Status (an alle)
    Video {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        #[serde(rename = "videoOn")]
        video_on: bool,
    },
    /// Raum verlassen (Client -> Relay)
    Leave,
    /// Peer hat den Raum verlassen (Relay -> verbleibende Mitglieder)
    PeerLeft {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
    /// Unbekannter Nachrichtentyp (No-Op)
    #[serde(other)]
    Unknown,
}

impl SignalMessage {
    /// Kurzname des Nachrichtentyps (fuer Logging)
    pub fn art(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Id { .. } => "id",
            Self::Peers { .. } => "peers",
            Self::NewPeer { .. } => "new-peer",
            Self::PeerName { .. } => "peer-name",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Ice { .. } => "ice",
            Self::Chat { .. } => "chat",
            Self::Mute { .. } => "mute",
            Self::Video { .. } => "video",
            Self::Leave => "leave",
            Self::PeerLeft { .. } => "peer-left",
            Self::Unknown => "unknown",
        }
    }

    /// Adressat einer weiterleitbaren Nachricht
    pub fn ziel(&self) -> Option<&PeerId> {
        match self {
            Self::PeerName { to, .. }
            | Self::Offer { to, .. }
            | Self::Answer { to, .. }
            | Self::Ice { to, .. }
            | Self::Chat { to, .. }
            | Self::Mute { to, .. }
            | Self::Video { to, .. } => to.as_ref(),
            _ => None,
        }
    }

    /// Absender einer weitergeleiteten Nachricht
    pub fn absender(&self) -> Option<&PeerId> {
        match self {
            Self::PeerName { from, .. }
            | Self::Offer { from, .. }
            | Self::Answer { from, .. }
            | Self::Ice { from, .. }
            | Self::Chat { from, .. }
            | Self::Mute { from, .. }
            | Self::Video { from, .. } => from.as_ref(),
            _ => None,
        }
    }

    /// Setzt den Absender (`from`) – der Relay ueberschreibt jede
    /// vom Client mitgeschickte Angabe.
    pub fn mit_absender(mut self, absender: PeerId) -> Self {
        match &mut self {
            Self::PeerName { from, .. }
            | Self::Offer { from, .. }
            | Self::Answer { from, .. }
            | Self::Ice { from, .. }
            | Self::Chat { from, .. }
            | Self::Mute { from, .. }
            | Self::Video { from, .. } => *from = Some(absender),
            _ => {}
        }
        self
    }

    /// Nachrichten die der Relay an einen einzelnen Peer weiterleitet
    pub fn ist_weiterleitbar(&self) -> bool {
        matches!(
            self,
            Self::PeerName { .. }
                | Self::Offer { .. }
                | Self::Answer { .. }
                | Self::Ice { .. }
                | Self::Chat { .. }
                | Self::Mute { .. }
                | Self::Video { .. }
        )
    }

    /// Nachrichten die ohne `to` an alle anderen Raum-Mitglieder gehen
    pub fn ist_broadcastfaehig(&self) -> bool {
        matches!(
            self,
            Self::Mute { .. } | Self::Video { .. } | Self::Chat { .. }
        )
    }

    // -----------------------------------------------------------------------
    // Konstruktoren
    // -----------------------------------------------------------------------

    /// Erstellt eine Join-Nachricht
    pub fn join(raum_id: RaumId, name: impl Into<String>) -> Self {
        Self::Join {
            room_id: raum_id,
            name: name.into(),
        }
    }

    /// Erstellt ein adressiertes Offer
    pub fn offer_an(ziel: PeerId, offer: SessionDescription) -> Self {
        Self::Offer {
            to: Some(ziel),
            from: None,
            offer,
        }
    }

    /// Erstellt ein adressiertes Answer
    pub fn answer_an(ziel: PeerId, answer: SessionDescription) -> Self {
        Self::Answer {
            to: Some(ziel),
            from: None,
            answer,
        }
    }

    /// Erstellt einen adressierten ICE-Kandidaten
    pub fn ice_an(ziel: PeerId, candidate: IceCandidate) -> Self {
        Self::Ice {
            to: Some(ziel),
            from: None,
            candidate,
        }
    }

    /// Erstellt eine adressierte Namensmitteilung
    pub fn peer_name_an(ziel: PeerId, name: impl Into<String>) -> Self {
        Self::PeerName {
            to: Some(ziel),
            from: None,
            name: name.into(),
        }
    }

    /// Erstellt eine Mute-Nachricht an alle
    pub fn mute(muted: bool) -> Self {
        Self::Mute {
            to: None,
            from: None,
            muted,
        }
    }

    /// Erstellt eine Video-Nachricht an alle
    pub fn video(video_on: bool) -> Self {
        Self::Video {
            to: None,
            from: None,
            video_on,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_aus_browser_json() {
        let msg: SignalMessage =
            serde_json::from_str(r#"{"type":"join","roomId":"R1","name":"A"}"#).unwrap();
        assert_eq!(msg, SignalMessage::join(RaumId::from("R1"), "A"));
    }

    #[test]
    fn join_ohne_namen_ist_erlaubt() {
        let msg: SignalMessage = serde_json::from_str(r#"{"type":"join","roomId":"R1"}"#).unwrap();
        assert!(matches!(msg, SignalMessage::Join { ref name, .. } if name.is_empty()));
    }

    #[test]
    fn kebab_case_typen() {
        let msg = SignalMessage::NewPeer {
            peer_id: PeerId::sequenziell(2),
            name: "B".into(),
        };
        let wert = serde_json::to_value(&msg).unwrap();
        assert_eq!(wert, json!({"type":"new-peer","peerId":"peer-2","name":"B"}));

        let wert = serde_json::to_value(SignalMessage::PeerLeft {
            peer_id: PeerId::sequenziell(1),
        })
        .unwrap();
        assert_eq!(wert, json!({"type":"peer-left","peerId":"peer-1"}));
    }

    #[test]
    fn offer_traegt_browser_description() {
        let json = r#"{"type":"offer","to":"peer-2","offer":{"type":"offer","sdp":"v=0"}}"#;
        let msg: SignalMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.ziel(), Some(&PeerId::sequenziell(2)));
        assert_eq!(msg.absender(), None);
        if let SignalMessage::Offer { offer, .. } = msg {
            assert_eq!(offer.typ, SdpTyp::Offer);
            assert_eq!(offer.sdp, "v=0");
        } else {
            panic!("Erwartet Offer");
        }
    }

    #[test]
    fn ice_kandidat_felder_in_camel_case() {
        let json = r#"{"type":"ice","to":"peer-1","candidate":{"candidate":"candidate:1 1 udp","sdpMid":"0","sdpMLineIndex":0}}"#;
        let msg: SignalMessage = serde_json::from_str(json).unwrap();
        if let SignalMessage::Ice { candidate, .. } = msg {
            assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
            assert_eq!(candidate.sdp_mline_index, Some(0));
            assert_eq!(candidate.username_fragment, None);
        } else {
            panic!("Erwartet Ice");
        }
    }

    #[test]
    fn mit_absender_ueberschreibt_from() {
        let msg = SignalMessage::Mute {
            to: None,
            from: Some(PeerId::from("gefaelscht")),
            muted: true,
        }
        .mit_absender(PeerId::sequenziell(1));
        assert_eq!(msg.absender(), Some(&PeerId::sequenziell(1)));

        let wert = serde_json::to_value(&msg).unwrap();
        assert_eq!(wert, json!({"type":"mute","from":"peer-1","muted":true}));
    }

    #[test]
    fn unbekannter_typ_wird_unknown() {
        let msg: SignalMessage =
            serde_json::from_str(r#"{"type":"hello","foo":1}"#).unwrap();
        assert_eq!(msg, SignalMessage::Unknown);
    }

    #[test]
    fn leave_ignoriert_zusatzfelder() {
        let msg: SignalMessage = serde_json::from_str(r#"{"type":"leave","id":"peer-1"}"#).unwrap();
        assert_eq!(msg, SignalMessage::Leave);
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"type":"leave"}"#);
    }

    #[test]
    fn weiterleitbar_und_broadcastfaehig() {
        assert!(SignalMessage::mute(true).ist_broadcastfaehig());
        assert!(SignalMessage::video(false).ist_weiterleitbar());
        assert!(!SignalMessage::offer_an(PeerId::sequenziell(1), SessionDescription::offer("x"))
            .ist_broadcastfaehig());
        assert!(!SignalMessage::Leave.ist_weiterleitbar());
        assert!(!SignalMessage::join(RaumId::from("R"), "A").ist_weiterleitbar());
    }
}
