//! Message-Dispatcher – Routet SignalMessages einer Verbindung
//!
//! Der Dispatcher empfaengt dekodierte Nachrichten einer Verbindung und
//! setzt sie in Operationen auf dem Raum-Verzeichnis um.
//!
//! ## Zustandspruefung
//! - `join` nur einmal pro Verbindung (weitere werden ignoriert)
//! - Weiterleitbare Nachrichten erst nach `join`
//! - Nachrichten die nur der Relay sendet (`id`, `peers`, `new-peer`,
//!   `peer-left`) werden vom Client nicht angenommen

use meshcall_core::types::{PeerId, RaumId};
use meshcall_observability::metrics::grund;
use meshcall_protocol::wire::dekodieren_mit_limit;
use meshcall_protocol::SignalMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::broadcast::{PeerSender, PeerSession, Zustellung};
use crate::error::SignalingError;
use crate::server_state::SignalingState;

/// Wie die Verbindung nach einer Nachricht weitermacht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steuerung {
    Weiter,
    /// Verbindung schliessen (nach `leave` oder abgelehntem Beitritt)
    Beenden,
}

/// Raum-Mitgliedschaft einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beitritt {
    pub raum_id: RaumId,
    pub peer_id: PeerId,
}

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    /// Adresse des Clients (Logging)
    pub peer_addr: SocketAddr,
    /// Send-Queue dieser Verbindung
    pub tx: mpsc::Sender<SignalMessage>,
    /// Gesetzt nach erfolgreichem `join`
    pub beitritt: Option<Beitritt>,
}

impl DispatcherContext {
    pub fn neu(peer_addr: SocketAddr, tx: mpsc::Sender<SignalMessage>) -> Self {
        Self {
            peer_addr,
            tx,
            beitritt: None,
        }
    }
}

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Dekodiert einen Textframe und verarbeitet ihn
    ///
    /// Unparsebare Frames und unbekannte Typen werden protokolliert und
    /// verworfen; die Verbindung bleibt offen.
    pub fn text_verarbeiten(&self, text: &str, ctx: &mut DispatcherContext) -> Steuerung {
        match dekodieren_mit_limit(text, self.state.config.max_nachrichten_bytes) {
            Ok(nachricht) => self.dispatch(nachricht, ctx),
            Err(e) => {
                tracing::warn!(peer = %ctx.peer_addr, fehler = %e, "Ungueltige Nachricht verworfen");
                self.state.metriken.verworfen(grund::UNGUELTIG);
                Steuerung::Weiter
            }
        }
    }

    /// Verarbeitet eine eingehende SignalMessage
    pub fn dispatch(&self, nachricht: SignalMessage, ctx: &mut DispatcherContext) -> Steuerung {
        match nachricht {
            // -------------------------------------------------------------------
            // Raum-Mitgliedschaft
            // -------------------------------------------------------------------
            SignalMessage::Join { room_id, name } => self.beitreten(room_id, name, ctx),

            SignalMessage::Leave => {
                tracing::debug!(peer = %ctx.peer_addr, "Leave empfangen");
                self.trennen(ctx);
                Steuerung::Beenden
            }

            // -------------------------------------------------------------------
            // Nur Relay -> Client
            // -------------------------------------------------------------------
            SignalMessage::Id { .. }
            | SignalMessage::Peers { .. }
            | SignalMessage::NewPeer { .. }
            | SignalMessage::PeerLeft { .. }
            | SignalMessage::Unknown => {
                tracing::warn!(
                    peer = %ctx.peer_addr,
                    art = nachricht.art(),
                    "Nachrichtentyp vom Client nicht erlaubt"
                );
                self.state.metriken.verworfen(grund::UNGUELTIG);
                Steuerung::Weiter
            }

            // -------------------------------------------------------------------
            // Weiterleitung
            // -------------------------------------------------------------------
            weiterleitbar => {
                self.weiterleiten(weiterleitbar, ctx);
                Steuerung::Weiter
            }
        }
    }

    /// Raeumt die Mitgliedschaft einer Verbindung auf (idempotent)
    ///
    /// Wird bei `leave`, Verbindungsabbruch, Timeout und Shutdown aufgerufen.
    pub fn trennen(&self, ctx: &mut DispatcherContext) {
        if let Some(beitritt) = ctx.beitritt.take() {
            self.state
                .verzeichnis
                .verlassen(&beitritt.raum_id, &beitritt.peer_id);
        }
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    fn beitreten(&self, raum_id: RaumId, name: String, ctx: &mut DispatcherContext) -> Steuerung {
        if let Some(b) = &ctx.beitritt {
            tracing::warn!(
                peer = %ctx.peer_addr,
                raum = %b.raum_id,
                neuer_raum = %raum_id,
                "Zweites join auf derselben Verbindung ignoriert"
            );
            return Steuerung::Weiter;
        }

        let peer_id = self.state.ids.naechste();
        let session = PeerSession {
            peer_id: peer_id.clone(),
            name,
            sender: PeerSender::neu(peer_id.clone(), ctx.tx.clone()),
        };

        match self.state.verzeichnis.beitreten(&raum_id, session) {
            Ok(()) => {
                ctx.beitritt = Some(Beitritt { raum_id, peer_id });
                Steuerung::Weiter
            }
            Err(SignalingError::RaumVoll(raum)) => {
                tracing::warn!(peer = %ctx.peer_addr, raum = %raum, "Raum voll, Verbindung wird geschlossen");
                Steuerung::Beenden
            }
            Err(e) => {
                tracing::warn!(peer = %ctx.peer_addr, fehler = %e, "Beitritt fehlgeschlagen");
                Steuerung::Weiter
            }
        }
    }

    fn weiterleiten(&self, nachricht: SignalMessage, ctx: &DispatcherContext) {
        let Some(beitritt) = &ctx.beitritt else {
            tracing::debug!(
                peer = %ctx.peer_addr,
                art = nachricht.art(),
                "Nachricht vor join verworfen"
            );
            self.state.metriken.verworfen(grund::NICHT_BEIGETRETEN);
            return;
        };

        let verzeichnis = &self.state.verzeichnis;
        match nachricht.ziel().cloned() {
            Some(ziel) => {
                let art = nachricht.art();
                let ergebnis =
                    verzeichnis.weiterleiten(&beitritt.raum_id, &beitritt.peer_id, &ziel, nachricht);
                if ergebnis != Zustellung::Zugestellt {
                    tracing::debug!(von = %beitritt.peer_id, an = %ziel, art, ergebnis = ?ergebnis, "Nicht zugestellt");
                }
            }
            None if nachricht.ist_broadcastfaehig() => {
                verzeichnis.broadcasten(&beitritt.raum_id, &beitritt.peer_id, nachricht);
            }
            None => {
                tracing::debug!(
                    von = %beitritt.peer_id,
                    art = nachricht.art(),
                    "Nachricht ohne Ziel verworfen"
                );
                self.state.metriken.verworfen(grund::ZIEL_FEHLT);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::SignalingConfig;
    use meshcall_observability::metrics::RelayMetriken;
    use meshcall_protocol::{IceCandidate, SessionDescription};

    fn state(max_peers_pro_raum: usize) -> Arc<SignalingState> {
        let config = SignalingConfig {
            max_peers_pro_raum,
            ..SignalingConfig::default()
        };
        SignalingState::neu(config, RelayMetriken::neu().unwrap())
    }

    fn verbindung() -> (DispatcherContext, mpsc::Receiver<SignalMessage>) {
        let (tx, rx) = mpsc::channel(32);
        (DispatcherContext::neu("127.0.0.1:9".parse().unwrap(), tx), rx)
    }

    fn alle(rx: &mut mpsc::Receiver<SignalMessage>) -> Vec<SignalMessage> {
        let mut v = Vec::new();
        while let Ok(m) = rx.try_recv() {
            v.push(m);
        }
        v
    }

    fn join(d: &MessageDispatcher, ctx: &mut DispatcherContext, raum: &str, name: &str) -> Steuerung {
        d.dispatch(SignalMessage::join(RaumId::from(raum), name), ctx)
    }

    #[test]
    fn join_vergibt_id_und_merkt_raum() {
        let d = MessageDispatcher::neu(state(0));
        let (mut ctx, mut rx) = verbindung();

        assert_eq!(join(&d, &mut ctx, "R1", "A"), Steuerung::Weiter);
        let b = ctx.beitritt.clone().unwrap();
        assert_eq!(b.raum_id, RaumId::from("R1"));
        assert_eq!(b.peer_id, PeerId::sequenziell(1));
        assert_eq!(
            alle(&mut rx)[0],
            SignalMessage::Id {
                id: PeerId::sequenziell(1)
            }
        );
    }

    #[test]
    fn zweites_join_wird_ignoriert() {
        let s = state(0);
        let d = MessageDispatcher::neu(Arc::clone(&s));
        let (mut ctx, mut rx) = verbindung();

        join(&d, &mut ctx, "R1", "A");
        alle(&mut rx);
        assert_eq!(join(&d, &mut ctx, "R2", "A"), Steuerung::Weiter);
        assert!(alle(&mut rx).is_empty());
        assert!(!s.verzeichnis.raum_existiert(&RaumId::from("R2")));
        assert_eq!(s.verzeichnis.peer_anzahl(), 1);
    }

    #[test]
    fn nachrichten_vor_join_werden_verworfen() {
        let s = state(0);
        let d = MessageDispatcher::neu(Arc::clone(&s));
        let (mut a, _ra) = verbindung();
        let (mut ctx, _rx) = verbindung();
        join(&d, &mut a, "R1", "A");

        let steuerung = d.dispatch(
            SignalMessage::ice_an(PeerId::sequenziell(1), IceCandidate::neu("candidate:1")),
            &mut ctx,
        );
        assert_eq!(steuerung, Steuerung::Weiter);
        assert_eq!(
            s.metriken
                .messages_dropped_total
                .with_label_values(&[grund::NICHT_BEIGETRETEN])
                .get(),
            1
        );
    }

    #[test]
    fn offer_wird_mit_absender_weitergeleitet() {
        let d = MessageDispatcher::neu(state(0));
        let (mut a, mut ra) = verbindung();
        let (mut b, mut rb) = verbindung();
        join(&d, &mut a, "R1", "A");
        join(&d, &mut b, "R1", "B");
        alle(&mut ra);
        alle(&mut rb);

        d.dispatch(
            SignalMessage::offer_an(PeerId::sequenziell(2), SessionDescription::offer("v=0")),
            &mut a,
        );
        assert_eq!(
            alle(&mut rb),
            vec![SignalMessage::Offer {
                to: Some(PeerId::sequenziell(2)),
                from: Some(PeerId::sequenziell(1)),
                offer: SessionDescription::offer("v=0"),
            }]
        );
    }

    #[test]
    fn chat_ohne_ziel_geht_an_alle() {
        let d = MessageDispatcher::neu(state(0));
        let (mut a, _ra) = verbindung();
        let (mut b, mut rb) = verbindung();
        let (mut c, mut rc) = verbindung();
        join(&d, &mut a, "R1", "A");
        join(&d, &mut b, "R1", "B");
        join(&d, &mut c, "R1", "C");
        alle(&mut rb);
        alle(&mut rc);

        d.text_verarbeiten(
            r#"{"type":"chat","sender":"A","text":"hallo","time":"10:00"}"#,
            &mut a,
        );
        assert_eq!(alle(&mut rb).len(), 1);
        assert_eq!(alle(&mut rc).len(), 1);
    }

    #[test]
    fn leave_raeumt_auf_und_beendet() {
        let s = state(0);
        let d = MessageDispatcher::neu(Arc::clone(&s));
        let (mut a, mut ra) = verbindung();
        let (mut b, _rb) = verbindung();
        join(&d, &mut a, "R1", "A");
        join(&d, &mut b, "R1", "B");
        alle(&mut ra);

        assert_eq!(d.text_verarbeiten(r#"{"type":"leave"}"#, &mut b), Steuerung::Beenden);
        assert!(b.beitritt.is_none());
        assert_eq!(
            alle(&mut ra),
            vec![SignalMessage::PeerLeft {
                peer_id: PeerId::sequenziell(2)
            }]
        );

        // Trennen nach leave ist ein No-Op
        d.trennen(&mut b);
        assert_eq!(s.verzeichnis.peer_anzahl(), 1);
    }

    #[test]
    fn kaputter_frame_haelt_verbindung_offen() {
        let s = state(0);
        let d = MessageDispatcher::neu(Arc::clone(&s));
        let (mut a, _ra) = verbindung();
        assert_eq!(d.text_verarbeiten("kein json", &mut a), Steuerung::Weiter);
        assert_eq!(d.text_verarbeiten(r#"{"type":"wat"}"#, &mut a), Steuerung::Weiter);
        assert_eq!(
            s.metriken
                .messages_dropped_total
                .with_label_values(&[grund::UNGUELTIG])
                .get(),
            2
        );
    }

    #[test]
    fn relay_nachrichten_vom_client_abgelehnt() {
        let s = state(0);
        let d = MessageDispatcher::neu(Arc::clone(&s));
        let (mut a, _ra) = verbindung();
        let (mut b, mut rb) = verbindung();
        join(&d, &mut a, "R1", "A");
        join(&d, &mut b, "R1", "B");
        alle(&mut rb);

        d.text_verarbeiten(r#"{"type":"peer-left","peerId":"peer-1"}"#, &mut a);
        assert!(alle(&mut rb).is_empty());
    }

    #[test]
    fn voller_raum_beendet_verbindung() {
        let s = state(1);
        let d = MessageDispatcher::neu(Arc::clone(&s));
        let (mut a, _ra) = verbindung();
        let (mut b, _rb) = verbindung();
        join(&d, &mut a, "R1", "A");
        assert_eq!(join(&d, &mut b, "R1", "B"), Steuerung::Beenden);
        assert!(b.beitritt.is_none());
    }
}
