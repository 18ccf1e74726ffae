//! Zustellung an Raum-Mitglieder
//!
//! Jede Verbindung besitzt eine begrenzte Send-Queue. Der Relay reiht
//! Nachrichten nicht-blockierend ein (`try_send`); eine volle Queue
//! verwirft die Nachricht fuer genau diesen Empfaenger, alle anderen
//! Empfaenger sind davon nicht betroffen.
//!
//! ## Selektive Zustellung innerhalb eines Raums
//! - An einen Peer: `Raum::an_peer_senden`
//! - An alle ausser dem Absender: `Raum::an_alle_ausser_zustellen`

use meshcall_core::types::{PeerId, RaumId};
use meshcall_protocol::{PeerInfo, SignalMessage};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// PeerSender
// ---------------------------------------------------------------------------

/// Ergebnis einer einzelnen Zustellung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    /// In die Send-Queue des Empfaengers eingereiht
    Zugestellt,
    /// Adressat ist nicht (mehr) im Raum
    ZielFehlt,
    /// Send-Queue des Empfaengers voll
    QueueVoll,
    /// Verbindung des Empfaengers bereits geschlossen
    Geschlossen,
}

impl Zustellung {
    pub fn ist_zugestellt(self) -> bool {
        self == Self::Zugestellt
    }
}

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct PeerSender {
    pub peer_id: PeerId,
    pub tx: mpsc::Sender<SignalMessage>,
}

impl PeerSender {
    pub fn neu(peer_id: PeerId, tx: mpsc::Sender<SignalMessage>) -> Self {
        Self { peer_id, tx }
    }

    /// Reiht eine Nachricht nicht-blockierend ein
    pub fn senden(&self, nachricht: SignalMessage) -> Zustellung {
        match self.tx.try_send(nachricht) {
            Ok(()) => Zustellung::Zugestellt,
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    peer = %self.peer_id,
                    art = n.art(),
                    "Send-Queue voll, Nachricht verworfen"
                );
                Zustellung::QueueVoll
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(peer = %self.peer_id, "Send-Queue geschlossen (Peer getrennt)");
                Zustellung::Geschlossen
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Raum
// ---------------------------------------------------------------------------

/// Mitglied eines Raums
#[derive(Clone, Debug)]
pub struct PeerSession {
    pub peer_id: PeerId,
    pub name: String,
    pub sender: PeerSender,
}

impl PeerSession {
    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            peer_id: self.peer_id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Ein Raum und seine Mitglieder in Beitrittsreihenfolge
///
/// Wird ausschliesslich unter dem Raum-Mutex des Verzeichnisses veraendert.
/// `geschlossen` markiert einen Raum der gerade aus dem Verzeichnis
/// entfernt wird; ein Beitritt muss dann einen neuen Raum anlegen.
#[derive(Debug)]
pub struct Raum {
    pub id: RaumId,
    mitglieder: Vec<PeerSession>,
    geschlossen: bool,
}

impl Raum {
    pub fn neu(id: RaumId) -> Self {
        Self {
            id,
            mitglieder: Vec::new(),
            geschlossen: false,
        }
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen
    }

    pub fn schliessen(&mut self) {
        self.geschlossen = true;
    }

    pub fn anzahl(&self) -> usize {
        self.mitglieder.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.mitglieder.is_empty()
    }

    pub fn enthaelt(&self, peer_id: &PeerId) -> bool {
        self.mitglieder.iter().any(|m| &m.peer_id == peer_id)
    }

    /// Mitgliederliste fuer `peers`
    pub fn infos(&self) -> Vec<PeerInfo> {
        self.mitglieder.iter().map(PeerSession::info).collect()
    }

    /// Fuegt ein Mitglied hinzu (Aufrufer prueft Duplikate)
    pub fn hinzufuegen(&mut self, session: PeerSession) {
        self.mitglieder.push(session);
    }

    /// Entfernt ein Mitglied, gibt die Session zurueck falls vorhanden
    pub fn entfernen(&mut self, peer_id: &PeerId) -> Option<PeerSession> {
        let pos = self.mitglieder.iter().position(|m| &m.peer_id == peer_id)?;
        Some(self.mitglieder.remove(pos))
    }

    /// Sendet an genau einen Peer dieses Raums
    pub fn an_peer_senden(&self, ziel: &PeerId, nachricht: SignalMessage) -> Zustellung {
        match self.mitglieder.iter().find(|m| &m.peer_id == ziel) {
            Some(m) => m.sender.senden(nachricht),
            None => Zustellung::ZielFehlt,
        }
    }

    /// Sendet an alle Mitglieder ausser `ausser`, ein Ergebnis pro Empfaenger
    pub fn an_alle_ausser_zustellen(&self, ausser: &PeerId, nachricht: &SignalMessage) -> Vec<Zustellung> {
        self.mitglieder
            .iter()
            .filter(|m| &m.peer_id != ausser)
            .map(|m| m.sender.senden(nachricht.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn session(n: u64, queue: usize) -> (PeerSession, mpsc::Receiver<SignalMessage>) {
        let (tx, rx) = mpsc::channel(queue);
        let peer_id = PeerId::sequenziell(n);
        (
            PeerSession {
                peer_id: peer_id.clone(),
                name: format!("Name{n}"),
                sender: PeerSender::neu(peer_id, tx),
            },
            rx,
        )
    }

    #[test]
    fn senden_an_volle_queue_verwirft() {
        let (s, _rx) = session(1, 1);
        assert_eq!(s.sender.senden(SignalMessage::Leave), Zustellung::Zugestellt);
        assert_eq!(s.sender.senden(SignalMessage::Leave), Zustellung::QueueVoll);
    }

    #[test]
    fn senden_an_geschlossene_queue() {
        let (s, rx) = session(1, 4);
        drop(rx);
        assert_eq!(s.sender.senden(SignalMessage::Leave), Zustellung::Geschlossen);
    }

    #[test]
    fn infos_in_beitrittsreihenfolge() {
        let mut raum = Raum::neu(RaumId::from("R"));
        let (a, _ra) = session(2, 4);
        let (b, _rb) = session(1, 4);
        raum.hinzufuegen(a);
        raum.hinzufuegen(b);
        let ids: Vec<_> = raum.infos().into_iter().map(|i| i.peer_id).collect();
        assert_eq!(ids, vec![PeerId::sequenziell(2), PeerId::sequenziell(1)]);
    }

    #[test]
    fn an_alle_ausser_absender() {
        let mut raum = Raum::neu(RaumId::from("R"));
        let (a, mut ra) = session(1, 4);
        let (b, mut rb) = session(2, 4);
        let (c, mut rc) = session(3, 4);
        raum.hinzufuegen(a);
        raum.hinzufuegen(b);
        raum.hinzufuegen(c);

        let z = raum.an_alle_ausser_zustellen(&PeerId::sequenziell(1), &SignalMessage::mute(true));
        assert_eq!(z, vec![Zustellung::Zugestellt, Zustellung::Zugestellt]);
        assert!(ra.try_recv().is_err());
        assert_eq!(rb.try_recv().unwrap(), SignalMessage::mute(true));
        assert_eq!(rc.try_recv().unwrap(), SignalMessage::mute(true));
    }

    #[test]
    fn volle_queue_blockiert_andere_nicht() {
        let mut raum = Raum::neu(RaumId::from("R"));
        let (a, _ra) = session(1, 4);
        let (b, _rb) = session(2, 1);
        let (c, mut rc) = session(3, 4);
        raum.hinzufuegen(a);
        raum.hinzufuegen(b);
        raum.hinzufuegen(c);

        raum.an_peer_senden(&PeerId::sequenziell(2), SignalMessage::Leave);
        let z = raum.an_alle_ausser_zustellen(&PeerId::sequenziell(1), &SignalMessage::video(false));
        assert_eq!(z, vec![Zustellung::QueueVoll, Zustellung::Zugestellt]);
        assert_eq!(rc.try_recv().unwrap(), SignalMessage::video(false));
    }

    #[test]
    fn entfernen_und_ziel_fehlt() {
        let mut raum = Raum::neu(RaumId::from("R"));
        let (a, _ra) = session(1, 4);
        raum.hinzufuegen(a);
        assert!(raum.entfernen(&PeerId::sequenziell(1)).is_some());
        assert!(raum.entfernen(&PeerId::sequenziell(1)).is_none());
        assert!(raum.ist_leer());
        assert_eq!(
            raum.an_peer_senden(&PeerId::sequenziell(1), SignalMessage::Leave),
            Zustellung::ZielFehlt
        );
    }
}
