//! Peer-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede WebSocket-Verbindung bekommt eine `PeerConnection` in einem eigenen
//! tokio-Task. Eingehende Textframes gehen an den `MessageDispatcher`,
//! ausgehende Nachrichten kommen aus der Send-Queue der Verbindung.
//!
//! ## Keepalive
//! - Relay sendet alle `keepalive_sek` einen WebSocket-Ping
//! - Jeder empfangene Frame (auch Pong) setzt den Timeout zurueck
//! - Nach `verbindungs_timeout_sek` ohne Frame wird die Verbindung wie
//!   nach einem `leave` aufgeraeumt

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use meshcall_protocol::wire::kodieren;
use meshcall_protocol::SignalMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::dispatcher::{DispatcherContext, MessageDispatcher, Steuerung};
use crate::server_state::SignalingState;

// ---------------------------------------------------------------------------
// Verbindungsplatz
// ---------------------------------------------------------------------------

/// Reservierter Platz im Verbindungslimit
///
/// Wird beim Drop freigegeben, auch wenn das Upgrade fehlschlaegt.
pub struct VerbindungsPlatz {
    state: Arc<SignalingState>,
}

impl VerbindungsPlatz {
    /// Reserviert einen Platz, `None` wenn `max_clients` erreicht ist
    pub fn reservieren(state: &Arc<SignalingState>) -> Option<Self> {
        state.verbindung_reservieren().then(|| Self {
            state: Arc::clone(state),
        })
    }
}

impl Drop for VerbindungsPlatz {
    fn drop(&mut self) {
        self.state.verbindung_freigeben();
    }
}

// ---------------------------------------------------------------------------
// Verbindungs-Ereignisse
// ---------------------------------------------------------------------------

/// Alles was auf einer Verbindung passieren kann, als ein Ereignis-Strom
#[derive(Debug)]
pub enum VerbindungsEreignis {
    /// Textframe vom Client
    Text(String),
    /// Binaerframe (wird ignoriert)
    Binaer(usize),
    /// Ping/Pong vom Client
    Lebenszeichen,
    /// Client hat geschlossen
    Geschlossen,
    /// Transportfehler
    Fehler(String),
    /// Nachricht aus der eigenen Send-Queue
    Ausgehend(SignalMessage),
    /// Keepalive-Intervall abgelaufen
    Keepalive,
    /// Relay faehrt herunter
    Shutdown,
}

impl VerbindungsEreignis {
    /// Uebersetzt einen gelesenen WebSocket-Frame
    pub fn aus_frame(frame: Option<Result<Message, axum::Error>>) -> Self {
        match frame {
            Some(Ok(Message::Text(text))) => Self::Text(text),
            Some(Ok(Message::Binary(daten))) => Self::Binaer(daten.len()),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Self::Lebenszeichen,
            Some(Ok(Message::Close(_))) | None => Self::Geschlossen,
            Some(Err(e)) => Self::Fehler(e.to_string()),
        }
    }

    /// Ereignisse die den Inaktivitaets-Timeout zuruecksetzen
    pub fn ist_empfang(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Binaer(_) | Self::Lebenszeichen)
    }
}

// ---------------------------------------------------------------------------
// PeerConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct PeerConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
    _platz: VerbindungsPlatz,
}

impl PeerConnection {
    /// Erstellt eine neue PeerConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr, platz: VerbindungsPlatz) -> Self {
        Self {
            state,
            peer_addr,
            _platz: platz,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, `leave` sendet, der Timeout greift
    /// oder ein Shutdown-Signal eingeht. Die Raum-Mitgliedschaft wird in
    /// jedem Fall aufgeraeumt.
    pub async fn verarbeiten(self, socket: WebSocket) {
        let peer_addr = self.peer_addr;
        let config = Arc::clone(&self.state.config);
        let timeout_dauer = Duration::from_secs(config.verbindungs_timeout_sek);
        let mut shutdown_rx = self.state.shutdown_abonnieren();

        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        let (mut ws_tx, mut ws_rx) = socket.split();
        let (sende_tx, mut sende_rx) =
            mpsc::channel::<SignalMessage>(config.send_queue_groesse.max(1));

        let mut ctx = DispatcherContext::neu(peer_addr, sende_tx);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        let mut keepalive = tokio::time::interval(Duration::from_secs(config.keepalive_sek.max(1)));
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Erster Tick kommt sofort
        keepalive.tick().await;

        let mut letzter_empfang = Instant::now();

        loop {
            let ereignis = tokio::select! {
                frame = ws_rx.next() => VerbindungsEreignis::aus_frame(frame),
                Some(ausgehend) = sende_rx.recv() => VerbindungsEreignis::Ausgehend(ausgehend),
                _ = keepalive.tick() => VerbindungsEreignis::Keepalive,
                Ok(()) = shutdown_rx.changed() => {
                    if !*shutdown_rx.borrow() {
                        continue;
                    }
                    VerbindungsEreignis::Shutdown
                }
            };

            if ereignis.ist_empfang() {
                letzter_empfang = Instant::now();
            }

            match ereignis {
                VerbindungsEreignis::Text(text) => {
                    tracing::trace!(peer = %peer_addr, bytes = text.len(), "Nachricht empfangen");
                    if dispatcher.text_verarbeiten(&text, &mut ctx) == Steuerung::Beenden {
                        break;
                    }
                }
                VerbindungsEreignis::Binaer(bytes) => {
                    tracing::debug!(peer = %peer_addr, bytes, "Binaerframe ignoriert");
                }
                VerbindungsEreignis::Lebenszeichen => {}
                VerbindungsEreignis::Geschlossen => {
                    tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                    break;
                }
                VerbindungsEreignis::Fehler(fehler) => {
                    tracing::warn!(peer = %peer_addr, fehler = %fehler, "WebSocket-Lesefehler");
                    break;
                }
                VerbindungsEreignis::Ausgehend(nachricht) => {
                    let text = match kodieren(&nachricht) {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::error!(peer = %peer_addr, fehler = %e, "Kodieren fehlgeschlagen");
                            continue;
                        }
                    };
                    if let Err(e) = ws_tx.send(Message::Text(text)).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                        break;
                    }
                }
                VerbindungsEreignis::Keepalive => {
                    if letzter_empfang.elapsed() > timeout_dauer {
                        tracing::warn!(peer = %peer_addr, "Verbindungs-Timeout");
                        break;
                    }
                    if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Ping-Senden fehlgeschlagen");
                        break;
                    }
                }
                VerbindungsEreignis::Shutdown => {
                    tracing::info!(peer = %peer_addr, "Shutdown-Signal, Verbindung wird getrennt");
                    break;
                }
            }
        }

        // Cleanup beim Verbindungsende
        dispatcher.trennen(&mut ctx);
        let _ = ws_tx.send(Message::Close(None)).await;

        tracing::info!(peer = %peer_addr, "Verbindungs-Task beendet");
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

    #[test]
    fn frames_werden_uebersetzt() {
        assert!(matches!(
            VerbindungsEreignis::aus_frame(Some(Ok(Message::Text("x".into())))),
            VerbindungsEreignis::Text(t) if t == "x"
        ));
        assert!(matches!(
            VerbindungsEreignis::aus_frame(Some(Ok(Message::Binary(vec![1, 2, 3])))),
            VerbindungsEreignis::Binaer(3)
        ));
        assert!(matches!(
            VerbindungsEreignis::aus_frame(None),
            VerbindungsEreignis::Geschlossen
        ));
        assert!(matches!(
            VerbindungsEreignis::aus_frame(Some(Ok(Message::Pong(vec![])))),
            VerbindungsEreignis::Lebenszeichen
        ));
    }

    #[test]
    fn nur_empfang_setzt_timeout_zurueck() {
        assert!(VerbindungsEreignis::Lebenszeichen.ist_empfang());
        assert!(VerbindungsEreignis::Text(String::new()).ist_empfang());
        assert!(!VerbindungsEreignis::Keepalive.ist_empfang());
        assert!(!VerbindungsEreignis::Ausgehend(SignalMessage::Leave).ist_empfang());
    }

    #[test]
    fn verbindungsplatz_wird_beim_drop_frei() {
        let config = SignalingConfig {
            max_clients: 1,
            ..SignalingConfig::default()
        };
        let state = SignalingState::neu(config, RelayMetriken::neu().unwrap());

        let platz = VerbindungsPlatz::reservieren(&state);
        assert!(platz.is_some());
        assert!(VerbindungsPlatz::reservieren(&state).is_none());
        drop(platz);
        assert!(VerbindungsPlatz::reservieren(&state).is_some());
    }
}
