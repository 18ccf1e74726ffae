//! Gemeinsamer Relay-Zustand
//!
//! Haelt Verzeichnis, ID-Vergabe, Metriken und das Shutdown-Signal als
//! Arc-Referenzen, die sicher zwischen tokio-Tasks geteilt werden koennen.

use meshcall_observability::health::StatusQuelle;
use meshcall_observability::metrics::RelayMetriken;
use meshcall_protocol::wire::DEFAULT_MAX_NACHRICHT_BYTES;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::ids::{IdStrategie, PeerIdVergabe};
use crate::presence::RaumVerzeichnis;

/// Standard-Pfad des WebSocket-Endpunkts
pub const DEFAULT_WS_PFAD: &str = "/api/ws/signaling";
/// Send-Queue pro Verbindung; ein Beitritt in grosse Raeume erzeugt Bursts
/// aus Answers und ICE-Kandidaten
pub const DEFAULT_SEND_QUEUE_GROESSE: usize = 256;

/// Konfiguration fuer den Signaling-Relay
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Relays (nur Logging)
    pub server_name: String,
    /// Maximale gleichzeitige WebSocket-Verbindungen
    pub max_clients: usize,
    /// Maximale Peers pro Raum (0 = unbegrenzt)
    pub max_peers_pro_raum: usize,
    /// Strategie fuer die Peer-ID-Vergabe
    pub id_strategie: IdStrategie,
    /// Pfad des WebSocket-Endpunkts
    pub ws_pfad: String,
    /// Maximale Groesse eines eingehenden Frames
    pub max_nachrichten_bytes: usize,
    /// Send-Queue pro Verbindung (Nachrichten)
    pub send_queue_groesse: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "meshcall Relay".to_string(),
            max_clients: 512,
            max_peers_pro_raum: 0,
            id_strategie: IdStrategie::default(),
            ws_pfad: DEFAULT_WS_PFAD.to_string(),
            max_nachrichten_bytes: DEFAULT_MAX_NACHRICHT_BYTES,
            send_queue_groesse: DEFAULT_SEND_QUEUE_GROESSE,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Relay-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Raeume und Mitglieder
    pub verzeichnis: RaumVerzeichnis,
    /// Peer-ID-Vergabe
    pub ids: PeerIdVergabe,
    /// Prometheus-Metriken
    pub metriken: RelayMetriken,
    /// Startzeitpunkt des Relays (fuer Uptime-Berechnung)
    pub start_time: Instant,
    /// Offene WebSocket-Verbindungen
    verbindungen: AtomicUsize,
    shutdown_tx: watch::Sender<bool>,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, metriken: RelayMetriken) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            verzeichnis: RaumVerzeichnis::neu(config.max_peers_pro_raum, metriken.clone()),
            ids: PeerIdVergabe::neu(config.id_strategie),
            config: Arc::new(config),
            metriken,
            start_time: Instant::now(),
            verbindungen: AtomicUsize::new(0),
            shutdown_tx,
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Reserviert einen Verbindungsplatz
    ///
    /// Gibt `false` zurueck wenn `max_clients` erreicht ist.
    pub fn verbindung_reservieren(&self) -> bool {
        let max = self.config.max_clients;
        self.verbindungen
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (max == 0 || n < max).then_some(n + 1)
            })
            .is_ok()
    }

    /// Gibt einen Verbindungsplatz frei
    pub fn verbindung_freigeben(&self) {
        let _ = self
            .verbindungen
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Anzahl offener Verbindungen (auch ohne Raum)
    pub fn verbindungs_anzahl(&self) -> usize {
        self.verbindungen.load(Ordering::Acquire)
    }

    /// Abonniert das Shutdown-Signal
    pub fn shutdown_abonnieren(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Loest den Shutdown aus; alle Verbindungen schliessen sich
    pub fn herunterfahren(&self) {
        tracing::info!(relay = %self.config.server_name, "Shutdown ausgeloest");
        self.shutdown_tx.send_replace(true);
    }

    /// Prueft ob der Shutdown bereits ausgeloest wurde
    pub fn faehrt_herunter(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl StatusQuelle for SignalingState {
    fn raum_anzahl(&self) -> usize {
        self.verzeichnis.raum_anzahl()
    }

    fn peer_anzahl(&self) -> usize {
        self.verzeichnis.peer_anzahl()
    }

    fn nimmt_verbindungen_an(&self) -> bool {
        !self.faehrt_herunter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(max_clients: usize) -> Arc<SignalingState> {
        let config = SignalingConfig {
            max_clients,
            ..SignalingConfig::default()
        };
        SignalingState::neu(config, RelayMetriken::neu().unwrap())
    }

    #[test]
    fn verbindungslimit_wird_eingehalten() {
        let s = state(2);
        assert!(s.verbindung_reservieren());
        assert!(s.verbindung_reservieren());
        assert!(!s.verbindung_reservieren());
        s.verbindung_freigeben();
        assert!(s.verbindung_reservieren());
        assert_eq!(s.verbindungs_anzahl(), 2);
    }

    #[test]
    fn freigeben_unterlaeuft_nicht() {
        let s = state(2);
        s.verbindung_freigeben();
        assert_eq!(s.verbindungs_anzahl(), 0);
    }

    #[test]
    fn null_bedeutet_unbegrenzt() {
        let s = state(0);
        for _ in 0..1000 {
            assert!(s.verbindung_reservieren());
        }
    }

    #[tokio::test]
    async fn shutdown_signal_erreicht_abonnenten() {
        let s = state(8);
        let mut rx = s.shutdown_abonnieren();
        assert!(s.nimmt_verbindungen_an());
        s.herunterfahren();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(!s.nimmt_verbindungen_an());
    }
}
