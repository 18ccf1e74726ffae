//! In-Memory-Adapter fuer Tests und lokale Entwicklung
//!
//! Alle Adapter-Traits des Orchestrators haben hier eine Implementierung
//! ohne Geraete und ohne Netzwerk. Sie protokollieren was der Orchestrator
//! aufruft, damit Tests das Verhalten pruefen koennen.
//!
//! `SpeicherTransportAdapter::automatisch` simuliert eine erfolgreiche
//! Verbindung: sobald lokale und Remote-Beschreibung gesetzt sind, meldet
//! der Transport `Verbunden` und einen Remote-Stream.

use async_trait::async_trait;
use meshcall_core::types::PeerId;
use meshcall_core::MeshcallError;
use meshcall_protocol::{IceCandidate, SessionDescription, SignalMessage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{IceServer, DEFAULT_DATENKANAL_LABEL};
use crate::error::{MeshError, MeshResult};
use crate::media::{MedienErfassung, MedienSpur, SpurArt};
use crate::relay::{RelayVerbinder, RelayVerbindung};
use crate::transport::{
    DatenKanal, PeerTransport, RemoteStream, TransportAdapter, TransportEreignisArt,
    TransportMelder,
};

// ---------------------------------------------------------------------------
// Medien
// ---------------------------------------------------------------------------

/// Spur ohne Geraet
#[derive(Debug)]
pub struct SpeicherSpur {
    art: SpurArt,
    aktiv: AtomicBool,
    stopps: AtomicUsize,
}

impl SpeicherSpur {
    pub fn neu(art: SpurArt) -> Self {
        Self {
            art,
            aktiv: AtomicBool::new(true),
            stopps: AtomicUsize::new(0),
        }
    }

    pub fn stopp_anzahl(&self) -> usize {
        self.stopps.load(Ordering::Acquire)
    }
}

impl MedienSpur for SpeicherSpur {
    fn art(&self) -> SpurArt {
        self.art
    }

    fn ist_aktiv(&self) -> bool {
        self.aktiv.load(Ordering::Acquire)
    }

    fn aktiv_setzen(&self, aktiv: bool) {
        self.aktiv.store(aktiv, Ordering::Release);
    }

    fn stoppen(&self) {
        self.stopps.fetch_add(1, Ordering::AcqRel);
    }
}

/// Erfassung ohne Geraete; kann eine verweigerte Berechtigung simulieren
#[derive(Debug, Default)]
pub struct SpeicherMedien {
    verweigern: bool,
    erfasst: Mutex<Vec<Arc<SpeicherSpur>>>,
}

impl SpeicherMedien {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Jede Erfassung schlaegt fehl
    pub fn verweigernd() -> Self {
        Self {
            verweigern: true,
            ..Self::default()
        }
    }

    /// Alle bisher erfassten Spuren
    pub fn spuren(&self) -> Vec<Arc<SpeicherSpur>> {
        self.erfasst.lock().clone()
    }
}

#[async_trait]
impl MedienErfassung for SpeicherMedien {
    async fn erfassen(&self, audio: bool, video: bool) -> MeshResult<Vec<Arc<dyn MedienSpur>>> {
        if self.verweigern {
            return Err(MeshError::Medien("Zugriff verweigert".into()));
        }
        let mut neu = Vec::new();
        if audio {
            neu.push(Arc::new(SpeicherSpur::neu(SpurArt::Audio)));
        }
        if video {
            neu.push(Arc::new(SpeicherSpur::neu(SpurArt::Video)));
        }
        self.erfasst.lock().extend(neu.iter().cloned());
        Ok(neu.into_iter().map(|s| s as Arc<dyn MedienSpur>).collect())
    }
}

// ---------------------------------------------------------------------------
// Stream und Datenkanal
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SpeicherStream {
    id: String,
}

impl SpeicherStream {
    pub fn neu(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl RemoteStream for SpeicherStream {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Datenkanal der gesendete Texte sammelt
#[derive(Debug)]
pub struct SpeicherDatenKanal {
    label: String,
    offen: AtomicBool,
    gesendet: Mutex<Vec<String>>,
}

impl SpeicherDatenKanal {
    pub fn neu(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            offen: AtomicBool::new(true),
            gesendet: Mutex::new(Vec::new()),
        }
    }

    pub fn offen_setzen(&self, offen: bool) {
        self.offen.store(offen, Ordering::Release);
    }

    pub fn gesendet(&self) -> Vec<String> {
        self.gesendet.lock().clone()
    }
}

impl DatenKanal for SpeicherDatenKanal {
    fn label(&self) -> &str {
        &self.label
    }

    fn ist_offen(&self) -> bool {
        self.offen.load(Ordering::Acquire)
    }

    fn senden(&self, text: &str) -> MeshResult<()> {
        if !self.ist_offen() {
            return Err(MeshError::transport("Datenkanal geschlossen"));
        }
        self.gesendet.lock().push(text.to_string());
        Ok(())
    }

    fn schliessen(&self) {
        self.offen_setzen(false);
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Welcher Schritt eines Transports fehlschlagen soll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fehlerstelle {
    Angebot,
    Antwort,
    Remote,
    Kandidat,
}

#[derive(Debug, Default)]
struct TransportProtokoll {
    lokal: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    kandidaten: Vec<IceCandidate>,
    spuren: usize,
    kanaele: Vec<Arc<SpeicherDatenKanal>>,
    geschlossen: usize,
    verbunden_gemeldet: bool,
}

/// Transport ohne Netzwerk
#[derive(Debug)]
pub struct SpeicherTransport {
    peer_id: PeerId,
    melder: Option<TransportMelder>,
    automatisch: bool,
    fehler: Option<Fehlerstelle>,
    protokoll: Mutex<TransportProtokoll>,
}

impl SpeicherTransport {
    fn neu(
        peer_id: PeerId,
        melder: Option<TransportMelder>,
        automatisch: bool,
        fehler: Option<Fehlerstelle>,
    ) -> Self {
        Self {
            peer_id,
            melder,
            automatisch,
            fehler,
            protokoll: Mutex::new(TransportProtokoll::default()),
        }
    }

    /// Transport dessen Ereignisse niemand empfaengt
    pub fn ohne_melder(peer_id: PeerId) -> Self {
        Self::neu(peer_id, None, false, None)
    }

    /// Meldet ein Ereignis an den Orchestrator
    pub fn melden(&self, art: TransportEreignisArt) -> bool {
        self.melder.as_ref().is_some_and(|m| m.melden(art))
    }

    pub fn lokal(&self) -> Option<SessionDescription> {
        self.protokoll.lock().lokal.clone()
    }

    pub fn remote(&self) -> Option<SessionDescription> {
        self.protokoll.lock().remote.clone()
    }

    pub fn kandidaten(&self) -> Vec<IceCandidate> {
        self.protokoll.lock().kandidaten.clone()
    }

    pub fn angehaengte_spuren(&self) -> usize {
        self.protokoll.lock().spuren
    }

    pub fn kanaele(&self) -> Vec<Arc<SpeicherDatenKanal>> {
        self.protokoll.lock().kanaele.clone()
    }

    pub fn schliess_anzahl(&self) -> usize {
        self.protokoll.lock().geschlossen
    }

    fn pruefen(&self, stelle: Fehlerstelle) -> MeshResult<()> {
        if self.fehler == Some(stelle) {
            return Err(MeshError::transport(format!("simulierter Fehler: {stelle:?}")));
        }
        Ok(())
    }

    /// Meldet Verbindung und Stream sobald beide Seiten beschrieben sind
    fn automatisch_verbinden(&self) {
        if !self.automatisch {
            return;
        }
        let melden = {
            let mut p = self.protokoll.lock();
            let bereit = p.lokal.is_some() && p.remote.is_some() && !p.verbunden_gemeldet;
            if bereit {
                p.verbunden_gemeldet = true;
            }
            bereit
        };
        if melden {
            // Antwortende Seite: Datenkanal der Gegenseite simulieren
            let fremder_kanal = {
                let mut p = self.protokoll.lock();
                if p.kanaele.is_empty() {
                    let kanal = Arc::new(SpeicherDatenKanal::neu(DEFAULT_DATENKANAL_LABEL));
                    p.kanaele.push(Arc::clone(&kanal));
                    Some(kanal)
                } else {
                    None
                }
            };
            if let Some(kanal) = fremder_kanal {
                self.melden(TransportEreignisArt::Datenkanal(kanal));
            }
            self.melden(TransportEreignisArt::Verbunden);
            self.melden(TransportEreignisArt::RemoteStream(Arc::new(SpeicherStream::neu(
                format!("stream-{}", self.peer_id),
            ))));
        }
    }

    fn lokal_setzen(&self, beschreibung: SessionDescription) {
        self.protokoll.lock().lokal = Some(beschreibung);
        if self.automatisch {
            self.melden(TransportEreignisArt::LokalerKandidat(IceCandidate::neu(format!(
                "candidate:{} 1 udp 2122260223 127.0.0.1 50000 typ host",
                self.peer_id
            ))));
        }
        self.automatisch_verbinden();
    }
}

#[async_trait]
impl PeerTransport for SpeicherTransport {
    async fn lokale_medien_anhaengen(&self, spuren: &[Arc<dyn MedienSpur>]) -> MeshResult<()> {
        self.protokoll.lock().spuren += spuren.len();
        Ok(())
    }

    async fn datenkanal_oeffnen(&self, label: &str) -> MeshResult<Arc<dyn DatenKanal>> {
        let kanal = Arc::new(SpeicherDatenKanal::neu(label));
        self.protokoll.lock().kanaele.push(Arc::clone(&kanal));
        Ok(kanal)
    }

    async fn angebot_erstellen(&self) -> MeshResult<SessionDescription> {
        self.pruefen(Fehlerstelle::Angebot)?;
        let angebot = SessionDescription::offer(format!("v=0 angebot {}", self.peer_id));
        self.lokal_setzen(angebot.clone());
        Ok(angebot)
    }

    async fn antwort_erstellen(&self) -> MeshResult<SessionDescription> {
        self.pruefen(Fehlerstelle::Antwort)?;
        if self.protokoll.lock().remote.is_none() {
            return Err(MeshError::transport("Answer ohne Remote-Beschreibung"));
        }
        let antwort = SessionDescription::answer(format!("v=0 antwort {}", self.peer_id));
        self.lokal_setzen(antwort.clone());
        Ok(antwort)
    }

    async fn remote_setzen(&self, beschreibung: SessionDescription) -> MeshResult<()> {
        self.pruefen(Fehlerstelle::Remote)?;
        self.protokoll.lock().remote = Some(beschreibung);
        self.automatisch_verbinden();
        Ok(())
    }

    async fn kandidat_hinzufuegen(&self, kandidat: IceCandidate) -> MeshResult<()> {
        self.pruefen(Fehlerstelle::Kandidat)?;
        let mut p = self.protokoll.lock();
        if p.remote.is_none() {
            return Err(MeshError::transport("Kandidat ohne Remote-Beschreibung"));
        }
        p.kandidaten.push(kandidat);
        Ok(())
    }

    async fn schliessen(&self) {
        let mut p = self.protokoll.lock();
        p.geschlossen += 1;
        for kanal in &p.kanaele {
            kanal.offen_setzen(false);
        }
    }
}

/// Erzeugt `SpeicherTransport`s und merkt sie sich
#[derive(Debug, Default)]
pub struct SpeicherTransportAdapter {
    automatisch: bool,
    fehler: Option<(PeerId, Fehlerstelle)>,
    transports: Mutex<Vec<Arc<SpeicherTransport>>>,
    ice_server: Mutex<Vec<IceServer>>,
}

impl SpeicherTransportAdapter {
    /// Transports melden nichts von selbst
    pub fn neu() -> Self {
        Self::default()
    }

    /// Transports melden `Verbunden` und Stream nach der Verhandlung
    pub fn automatisch() -> Self {
        Self {
            automatisch: true,
            ..Self::default()
        }
    }

    /// Transports fuer `peer_id` scheitern an `stelle`
    pub fn mit_fehler(mut self, peer_id: PeerId, stelle: Fehlerstelle) -> Self {
        self.fehler = Some((peer_id, stelle));
        self
    }

    pub fn transports(&self) -> Vec<Arc<SpeicherTransport>> {
        self.transports.lock().clone()
    }

    /// Zuletzt erzeugter Transport fuer einen Peer
    pub fn transport_fuer(&self, peer_id: &PeerId) -> Option<Arc<SpeicherTransport>> {
        self.transports
            .lock()
            .iter()
            .rev()
            .find(|t| &t.peer_id == peer_id)
            .cloned()
    }

    /// ICE-Server mit denen zuletzt ein Transport erzeugt wurde
    pub fn letzte_ice_server(&self) -> Vec<IceServer> {
        self.ice_server.lock().clone()
    }
}

#[async_trait]
impl TransportAdapter for SpeicherTransportAdapter {
    async fn transport_erstellen(
        &self,
        peer_id: &PeerId,
        ice_server: &[IceServer],
        ereignisse: TransportMelder,
    ) -> MeshResult<Arc<dyn PeerTransport>> {
        let fehler = self
            .fehler
            .as_ref()
            .filter(|(p, _)| p == peer_id)
            .map(|(_, stelle)| *stelle);
        let transport = Arc::new(SpeicherTransport::neu(
            peer_id.clone(),
            Some(ereignisse),
            self.automatisch,
            fehler,
        ));
        *self.ice_server.lock() = ice_server.to_vec();
        self.transports.lock().push(Arc::clone(&transport));
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Gegenseite einer `SpeicherRelay`-Verbindung (spielt den Relay)
#[derive(Debug)]
pub struct RelayGegenstelle {
    /// Was der Orchestrator gesendet hat
    pub von_client: mpsc::UnboundedReceiver<SignalMessage>,
    /// Was der Orchestrator empfangen soll; Drop trennt die Verbindung
    pub an_client: mpsc::Sender<SignalMessage>,
}

impl RelayGegenstelle {
    /// Reiht eine Nachricht fuer den Orchestrator ein
    pub fn senden(&self, nachricht: SignalMessage) {
        if self.an_client.try_send(nachricht).is_err() {
            tracing::warn!("RelayGegenstelle: Nachricht nicht zustellbar");
        }
    }

    /// Alle bisher vom Orchestrator gesendeten Nachrichten
    pub fn empfangene(&mut self) -> Vec<SignalMessage> {
        let mut v = Vec::new();
        while let Ok(n) = self.von_client.try_recv() {
            v.push(n);
        }
        v
    }
}

/// Relay-Verbinder ueber In-Memory-Kanaele
#[derive(Debug, Default)]
pub struct SpeicherRelay {
    bereit: Mutex<Option<RelayVerbindung>>,
    verbindungen: AtomicUsize,
}

impl SpeicherRelay {
    /// Erstellt den Verbinder samt Gegenstelle fuer die erste Verbindung
    pub fn neu() -> (Self, RelayGegenstelle) {
        let relay = Self::default();
        let gegenstelle = relay.naechste_verbindung();
        (relay, gegenstelle)
    }

    /// Bereitet die naechste Verbindung vor (z.B. fuer einen Neustart)
    pub fn naechste_verbindung(&self) -> RelayGegenstelle {
        let (ausgang_tx, ausgang_rx) = mpsc::unbounded_channel();
        let (eingang_tx, eingang_rx) = mpsc::channel(256);
        *self.bereit.lock() = Some(RelayVerbindung {
            sender: ausgang_tx,
            empfaenger: eingang_rx,
        });
        RelayGegenstelle {
            von_client: ausgang_rx,
            an_client: eingang_tx,
        }
    }

    /// Anzahl der `verbinden`-Aufrufe
    pub fn verbindungs_versuche(&self) -> usize {
        self.verbindungen.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RelayVerbinder for SpeicherRelay {
    async fn verbinden(&self, url: &str) -> MeshResult<RelayVerbindung> {
        self.verbindungen.fetch_add(1, Ordering::AcqRel);
        self.bereit
            .lock()
            .take()
            .ok_or_else(|| MeshcallError::Verbindung(format!("{url}: keine Verbindung vorbereitet")).into())
    }
}
