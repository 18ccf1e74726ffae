//! Raum-Verzeichnis – Verwaltet Raeume und ihre Mitglieder
//!
//! Wer ist in welchem Raum? Das Verzeichnis haelt den ephemeren Zustand
//! aller Raeume, stellt Nachrichten innerhalb eines Raums zu und
//! veroeffentlicht jede Aenderung als `RaumEreignis`.
//!
//! ## Nebenlaeufigkeit
//! - Jeder Raum liegt hinter einem eigenen `parking_lot::Mutex`; Operationen
//!   auf verschiedenen Raeumen laufen parallel.
//! - Alle Zustellungen passieren unter dem Raum-Mutex (nicht-blockierend via
//!   `try_send`). Damit ist die Reihenfolge pro Raum total: wer `new-peer`
//!   fuer X erhalten hat, erhaelt spaeter auch `peer-left` fuer X.
//! - Sperr-Reihenfolge: erst Raum-Mutex, dann DashMap-Shard. Der Shard wird
//!   nie gehalten waehrend ein Raum-Mutex angefordert wird.
//! - Ein Raum der leer wird, wird als `geschlossen` markiert und entfernt.
//!   Ein Beitritt der einen geschlossenen Raum erwischt, versucht es erneut
//!   und legt einen frischen Raum an.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use meshcall_core::event::RaumEreignis;
use meshcall_core::types::{PeerId, RaumId};
use meshcall_observability::metrics::{grund, RelayMetriken};
use meshcall_protocol::{PeerInfo, SignalMessage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::broadcast::{PeerSession, Raum, Zustellung};
use crate::error::{SignalingError, SignalingResult};

/// Groesse des Broadcast-Kanals fuer Raum-Ereignisse
const EVENT_KANAL_GROESSE: usize = 256;

// ---------------------------------------------------------------------------
// RaumVerzeichnis
// ---------------------------------------------------------------------------

/// Verzeichnis aller Raeume des Relays
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RaumVerzeichnis {
    inner: Arc<RaumVerzeichnisInner>,
}

struct RaumVerzeichnisInner {
    raeume: DashMap<RaumId, Arc<Mutex<Raum>>>,
    /// Peers ueber alle Raeume
    peer_zaehler: AtomicUsize,
    /// 0 = unbegrenzt
    max_peers_pro_raum: usize,
    event_tx: broadcast::Sender<RaumEreignis>,
    metriken: RelayMetriken,
}

impl RaumVerzeichnis {
    /// Erstellt ein leeres Verzeichnis
    pub fn neu(max_peers_pro_raum: usize, metriken: RelayMetriken) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_KANAL_GROESSE);
        Self {
            inner: Arc::new(RaumVerzeichnisInner {
                raeume: DashMap::new(),
                peer_zaehler: AtomicUsize::new(0),
                max_peers_pro_raum,
                event_tx,
                metriken,
            }),
        }
    }

    /// Fuegt einen Peer einem Raum hinzu (legt den Raum bei Bedarf an)
    ///
    /// Unter dem Raum-Mutex, in dieser Reihenfolge:
    /// 1. `id` an den Beitretenden
    /// 2. `peers` (bisherige Mitglieder) an den Beitretenden
    /// 3. `new-peer` an alle bisherigen Mitglieder
    pub fn beitreten(&self, raum_id: &RaumId, session: PeerSession) -> SignalingResult<()> {
        loop {
            let raum_arc = match self.inner.raeume.entry(raum_id.clone()) {
                Entry::Occupied(e) => Arc::clone(e.get()),
                Entry::Vacant(v) => {
                    let raum = Arc::new(Mutex::new(Raum::neu(raum_id.clone())));
                    v.insert(Arc::clone(&raum));
                    raum
                }
            };

            let mut raum = raum_arc.lock();
            if raum.ist_geschlossen() {
                // Wird gerade entfernt; naechster Durchlauf legt neu an
                continue;
            }

            if raum.enthaelt(&session.peer_id) {
                return Err(SignalingError::BereitsBeigetreten(raum_id.clone()));
            }
            let max = self.inner.max_peers_pro_raum;
            if max > 0 && raum.anzahl() >= max {
                return Err(SignalingError::RaumVoll(raum_id.clone()));
            }

            // Der erste Beitritt unter dem Lock zaehlt den Raum, nicht das Einfuegen
            if raum.ist_leer() {
                self.inner.metriken.rooms_active.inc();
                tracing::debug!(raum = %raum_id, "Raum erstellt");
                self.ereignis(RaumEreignis::RaumErstellt {
                    raum_id: raum_id.clone(),
                });
            }

            let peer_id = session.peer_id.clone();
            let name = session.name.clone();

            self.zaehlen(session.sender.senden(SignalMessage::Id {
                id: peer_id.clone(),
            }));
            self.zaehlen(session.sender.senden(SignalMessage::Peers {
                peers: raum.infos(),
            }));
            self.verteilen(
                &raum,
                &peer_id,
                &SignalMessage::NewPeer {
                    peer_id: peer_id.clone(),
                    name: name.clone(),
                },
            );
            raum.hinzufuegen(session);

            self.inner.peer_zaehler.fetch_add(1, Ordering::Relaxed);
            self.inner.metriken.joins_total.inc();
            self.inner.metriken.connected_peers.inc();

            tracing::info!(raum = %raum_id, peer = %peer_id, name = %name, mitglieder = raum.anzahl(), "Peer beigetreten");
            self.ereignis(RaumEreignis::PeerBeigetreten {
                raum_id: raum_id.clone(),
                peer_id,
                name,
            });
            return Ok(());
        }
    }

    /// Entfernt einen Peer aus einem Raum
    ///
    /// Verbleibende Mitglieder erhalten `peer-left`. Wird der Raum dadurch
    /// leer, wird er entfernt. Gibt `false` zurueck wenn der Peer nicht im
    /// Raum war (idempotent).
    pub fn verlassen(&self, raum_id: &RaumId, peer_id: &PeerId) -> bool {
        let Some(raum_arc) = self.raum_holen(raum_id) else {
            return false;
        };

        let mut raum = raum_arc.lock();
        if raum.entfernen(peer_id).is_none() {
            return false;
        }

        self.verteilen(
            &raum,
            peer_id,
            &SignalMessage::PeerLeft {
                peer_id: peer_id.clone(),
            },
        );

        self.inner.peer_zaehler.fetch_sub(1, Ordering::Relaxed);
        self.inner.metriken.connected_peers.dec();
        tracing::info!(raum = %raum_id, peer = %peer_id, mitglieder = raum.anzahl(), "Peer hat Raum verlassen");
        self.ereignis(RaumEreignis::PeerVerlassen {
            raum_id: raum_id.clone(),
            peer_id: peer_id.clone(),
        });

        if raum.ist_leer() {
            raum.schliessen();
            self.inner
                .raeume
                .remove_if(raum_id, |_, r| Arc::ptr_eq(r, &raum_arc));
            self.inner.metriken.rooms_active.dec();
            tracing::debug!(raum = %raum_id, "Leerer Raum entfernt");
            self.ereignis(RaumEreignis::RaumEntfernt {
                raum_id: raum_id.clone(),
            });
        }
        true
    }

    /// Leitet eine Nachricht an genau einen Peer im selben Raum weiter
    ///
    /// `from` wird auf den Absender gesetzt, egal was der Client geschickt hat.
    pub fn weiterleiten(
        &self,
        raum_id: &RaumId,
        absender: &PeerId,
        ziel: &PeerId,
        nachricht: SignalMessage,
    ) -> Zustellung {
        let Some(raum_arc) = self.raum_holen(raum_id) else {
            self.inner.metriken.verworfen(grund::ZIEL_FEHLT);
            return Zustellung::ZielFehlt;
        };

        let raum = raum_arc.lock();
        let art = nachricht.art();
        let ergebnis = raum.an_peer_senden(ziel, nachricht.mit_absender(absender.clone()));
        match ergebnis {
            Zustellung::Zugestellt => self.inner.metriken.messages_routed_total.inc(),
            Zustellung::ZielFehlt => {
                tracing::debug!(raum = %raum_id, von = %absender, an = %ziel, art, "Ziel nicht im Raum, Nachricht verworfen");
                self.inner.metriken.verworfen(grund::ZIEL_FEHLT);
            }
            Zustellung::QueueVoll => self.inner.metriken.verworfen(grund::QUEUE_VOLL),
            Zustellung::Geschlossen => {}
        }
        ergebnis
    }

    /// Sendet eine Nachricht an alle anderen Mitglieder des Raums
    ///
    /// Gibt die Anzahl der Zustellungen zurueck.
    pub fn broadcasten(&self, raum_id: &RaumId, absender: &PeerId, nachricht: SignalMessage) -> usize {
        let Some(raum_arc) = self.raum_holen(raum_id) else {
            return 0;
        };

        let raum = raum_arc.lock();
        let nachricht = nachricht.mit_absender(absender.clone());
        let n = self.verteilen(&raum, absender, &nachricht);
        self.inner.metriken.messages_broadcast_total.inc_by(n as u64);
        n
    }

    /// Sendet an alle ausser `ausser` und zaehlt verworfene Nachrichten
    fn verteilen(&self, raum: &Raum, ausser: &PeerId, nachricht: &SignalMessage) -> usize {
        raum.an_alle_ausser_zustellen(ausser, nachricht)
            .into_iter()
            .filter(|z| self.zaehlen(*z))
            .count()
    }

    fn zaehlen(&self, zustellung: Zustellung) -> bool {
        if zustellung == Zustellung::QueueVoll {
            self.inner.metriken.verworfen(grund::QUEUE_VOLL);
        }
        zustellung.ist_zugestellt()
    }

    /// Mitglieder eines Raums in Beitrittsreihenfolge
    pub fn mitglieder(&self, raum_id: &RaumId) -> Vec<PeerInfo> {
        self.raum_holen(raum_id)
            .map(|r| r.lock().infos())
            .unwrap_or_default()
    }

    /// Prueft ob ein Raum existiert
    pub fn raum_existiert(&self, raum_id: &RaumId) -> bool {
        self.inner.raeume.contains_key(raum_id)
    }

    /// Anzahl existierender Raeume
    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    /// Anzahl der Peers ueber alle Raeume
    pub fn peer_anzahl(&self) -> usize {
        self.inner.peer_zaehler.load(Ordering::Relaxed)
    }

    /// Abonniert Raum-Ereignisse
    pub fn ereignisse_abonnieren(&self) -> broadcast::Receiver<RaumEreignis> {
        self.inner.event_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    /// Klont den Raum-Handle; der Shard-Lock endet mit dieser Funktion
    fn raum_holen(&self, raum_id: &RaumId) -> Option<Arc<Mutex<Raum>>> {
        self.inner.raeume.get(raum_id).map(|r| Arc::clone(r.value()))
    }

    fn ereignis(&self, ereignis: RaumEreignis) {
        // Keine Abonnenten ist kein Fehler
        let _ = self.inner.event_tx.send(ereignis);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
