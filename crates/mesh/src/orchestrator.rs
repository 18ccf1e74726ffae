//! Mesh-Orchestrator
//!
//! Eine Instanz pro Sitzung. Der Orchestrator besitzt alle Links, die
//! lokalen Medien und die Relay-Verbindung; alle Eingaben (Relay-Nachrichten
//! und Transport-Ereignisse) laufen durch genau eine Verarbeitungsroutine.
//!
//! ## Ablauf
//! 1. `start`: Medien erfassen, ICE-Server holen, Relay verbinden, `join`
//!    senden, auf `id` warten
//! 2. `naechster_schritt` (oder `spawnen`): Eingaben nacheinander verarbeiten
//! 3. `schliessen`: `leave`, Links schliessen, Medien freigeben
//!
//! ## Initiator-Regel
//! Nur der neu beigetretene Peer sendet Offers (an alle aus `peers`).
//! Bestehende Mitglieder warten auf das Offer. So entsteht pro Paar genau
//! eine Verhandlung.

use meshcall_core::types::{PeerId, RaumId};
use meshcall_core::MeshcallError;
use meshcall_protocol::{ChatMessage, IceCandidate, PeerInfo, SessionDescription, SignalMessage};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{IceServer, MeshConfig};
use crate::credentials::ZugangsdatenQuelle;
use crate::error::{MeshError, MeshResult};
use crate::events::MeshEreignis;
use crate::link::{LinkZustand, RemotePeerLink};
use crate::media::{LokaleMedien, MedienErfassung, SpurArt};
use crate::relay::{RelayVerbinder, RelayVerbindung};
use crate::transport::{
    DatenKanal, PeerTransport, TransportAdapter, TransportEreignis, TransportEreignisArt,
    TransportMelder,
};

// ---------------------------------------------------------------------------
// Adapter & Sitzung
// ---------------------------------------------------------------------------

/// Alle Aussenanbindungen des Orchestrators
#[derive(Clone)]
pub struct MeshAdapter {
    pub medien: Arc<dyn MedienErfassung>,
    pub transport: Arc<dyn TransportAdapter>,
    pub zugangsdaten: Arc<dyn ZugangsdatenQuelle>,
    pub relay: Arc<dyn RelayVerbinder>,
}

/// Zustand zwischen `start` und `schliessen`
struct Sitzung {
    raum_id: RaumId,
    eigene_id: PeerId,
    name: String,
    relay_tx: Option<mpsc::UnboundedSender<SignalMessage>>,
    relay_rx: Option<mpsc::Receiver<SignalMessage>>,
    /// Nachrichten die waehrend `start` vor der `id` ankamen
    vorab: VecDeque<SignalMessage>,
    medien: Arc<LokaleMedien>,
    ice_server: Vec<IceServer>,
}

/// Eine Eingabe fuer die Verarbeitungsroutine
#[derive(Debug)]
pub enum Eingabe {
    Relay(SignalMessage),
    RelayGetrennt,
    Transport(TransportEreignis),
}

// ---------------------------------------------------------------------------
// MeshOrchestrator
// ---------------------------------------------------------------------------

/// Verwaltet die Links zu allen anderen Peers eines Raums
pub struct MeshOrchestrator {
    config: MeshConfig,
    adapter: MeshAdapter,
    ereignisse: mpsc::UnboundedSender<MeshEreignis>,
    transport_tx: mpsc::UnboundedSender<TransportEreignis>,
    transport_rx: mpsc::UnboundedReceiver<TransportEreignis>,
    links: HashMap<PeerId, RemotePeerLink>,
    /// Bekannte Anzeigenamen (aus `peers`, `new-peer`, `peer-name`)
    namen: HashMap<PeerId, String>,
    sitzung: Option<Sitzung>,
    generation: u64,
}

impl MeshOrchestrator {
    /// Erstellt einen Orchestrator und den Ereignis-Empfaenger fuer die Oberflaeche
    pub fn neu(
        config: MeshConfig,
        adapter: MeshAdapter,
    ) -> (Self, mpsc::UnboundedReceiver<MeshEreignis>) {
        let (ereignisse, ereignis_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                adapter,
                ereignisse,
                transport_tx,
                transport_rx,
                links: HashMap::new(),
                namen: HashMap::new(),
                sitzung: None,
                generation: 0,
            },
            ereignis_rx,
        )
    }

    // -----------------------------------------------------------------------
    // Zugriff
    // -----------------------------------------------------------------------

    /// Vom Relay zugewiesene Identitaet (nur waehrend einer Sitzung)
    pub fn eigene_id(&self) -> Option<&PeerId> {
        self.sitzung.as_ref().map(|s| &s.eigene_id)
    }

    pub fn raum_id(&self) -> Option<&RaumId> {
        self.sitzung.as_ref().map(|s| &s.raum_id)
    }

    pub fn ist_aktiv(&self) -> bool {
        self.sitzung.is_some()
    }

    pub fn link_zustand(&self, peer_id: &PeerId) -> Option<LinkZustand> {
        self.links.get(peer_id).map(RemotePeerLink::zustand)
    }

    pub fn link_anzahl(&self) -> usize {
        self.links.len()
    }

    pub fn peer_name(&self, peer_id: &PeerId) -> Option<&str> {
        self.namen.get(peer_id).map(String::as_str)
    }

    // -----------------------------------------------------------------------
    // Start
    // -----------------------------------------------------------------------

    /// Tritt einem Raum bei und liefert die eigene Peer-ID
    ///
    /// Schlaegt die Medienerfassung fehl, wird der Relay nicht kontaktiert.
    pub async fn start(&mut self, raum_id: RaumId, name: impl Into<String>) -> MeshResult<PeerId> {
        if self.sitzung.is_some() {
            return Err(MeshError::sitzung("Sitzung laeuft bereits"));
        }
        let name = name.into();

        let spuren = self.adapter.medien.erfassen(true, true).await?;
        let medien = Arc::new(LokaleMedien::neu(spuren));

        let ice_server = match self.adapter.zugangsdaten.ice_server().await {
            Ok(server) => server,
            Err(e) => {
                tracing::warn!(fehler = %e, "ICE-Zugangsdaten nicht verfuegbar, fahre ohne fort");
                Vec::new()
            }
        };

        let RelayVerbindung {
            sender,
            mut empfaenger,
        } = match self.adapter.relay.verbinden(&self.config.relay_url).await {
            Ok(v) => v,
            Err(e) => {
                medien.freigeben();
                return Err(e);
            }
        };

        if sender
            .send(SignalMessage::join(raum_id.clone(), name.clone()))
            .is_err()
        {
            medien.freigeben();
            return Err(MeshcallError::Getrennt("join nicht gesendet".into()).into());
        }

        let mut vorab = VecDeque::new();
        let auf_id_warten = async {
            loop {
                match empfaenger.recv().await {
                    Some(SignalMessage::Id { id }) => return Some(id),
                    Some(andere) => vorab.push_back(andere),
                    None => return None,
                }
            }
        };
        let timeout = Duration::from_secs(self.config.start_timeout_sek);
        let eigene_id = match tokio::time::timeout(timeout, auf_id_warten).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                medien.freigeben();
                return Err(MeshcallError::Getrennt("Relay vor id getrennt".into()).into());
            }
            Err(_) => {
                medien.freigeben();
                return Err(MeshError::sitzung(format!(
                    "keine id vom Relay nach {}s",
                    self.config.start_timeout_sek
                )));
            }
        };

        tracing::info!(raum = %raum_id, peer = %eigene_id, "Raum beigetreten");

        self.sitzung = Some(Sitzung {
            raum_id,
            eigene_id: eigene_id.clone(),
            name,
            relay_tx: Some(sender),
            relay_rx: Some(empfaenger),
            vorab,
            medien,
            ice_server,
        });
        Ok(eigene_id)
    }

    // -----------------------------------------------------------------------
    // Verarbeitungsschleife
    // -----------------------------------------------------------------------

    /// Wartet auf die naechste Eingabe
    ///
    /// Cancel-safe: es wird nur empfangen, nichts verarbeitet. `None` wenn
    /// keine Sitzung laeuft.
    pub async fn naechste_eingabe(&mut self) -> Option<Eingabe> {
        let sitzung = self.sitzung.as_mut()?;
        if let Some(nachricht) = sitzung.vorab.pop_front() {
            return Some(Eingabe::Relay(nachricht));
        }
        let relay = sitzung.relay_rx.as_mut();
        let transport = &mut self.transport_rx;

        tokio::select! {
            biased;

            Some(ereignis) = transport.recv() => Some(Eingabe::Transport(ereignis)),
            nachricht = async {
                match relay {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => Some(match nachricht {
                Some(n) => Eingabe::Relay(n),
                None => Eingabe::RelayGetrennt,
            }),
        }
    }

    /// Verarbeitet eine Eingabe
    ///
    /// Fehler einzelner Links schliessen nur diesen Link.
    pub async fn eingabe_verarbeiten(&mut self, eingabe: Eingabe) -> MeshResult<()> {
        match eingabe {
            Eingabe::Relay(nachricht) => self.relay_nachricht(nachricht).await,
            Eingabe::RelayGetrennt => {
                if let Some(sitzung) = self.sitzung.as_mut() {
                    sitzung.relay_rx = None;
                    sitzung.relay_tx = None;
                }
                tracing::warn!(links = self.links.len(), "Relay-Verbindung verloren, Links bleiben bestehen");
                self.melden(MeshEreignis::RelayGetrennt);
            }
            Eingabe::Transport(ereignis) => self.transport_ereignis(ereignis).await,
        }
        Ok(())
    }

    /// Wartet auf eine Eingabe und verarbeitet sie
    ///
    /// `false` wenn keine Sitzung laeuft.
    pub async fn naechster_schritt(&mut self) -> MeshResult<bool> {
        match self.naechste_eingabe().await {
            Some(eingabe) => {
                self.eingabe_verarbeiten(eingabe).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Relay-Nachrichten
    // -----------------------------------------------------------------------

    async fn relay_nachricht(&mut self, nachricht: SignalMessage) {
        tracing::trace!(art = nachricht.art(), "Relay-Nachricht");
        match nachricht {
            SignalMessage::Peers { peers } => self.peers_verarbeiten(peers).await,

            SignalMessage::NewPeer { peer_id, name } => {
                tracing::info!(peer = %peer_id, name = %name, "Neuer Peer im Raum");
                self.namen.insert(peer_id.clone(), name.clone());
                self.melden(MeshEreignis::PeerBeigetreten { peer_id, name });
            }

            SignalMessage::PeerName {
                from: Some(peer_id),
                name,
                ..
            } => {
                if let Some(link) = self.links.get_mut(&peer_id) {
                    link.name = name.clone();
                }
                self.namen.insert(peer_id, name);
            }

            SignalMessage::Offer {
                from: Some(peer_id),
                offer,
                ..
            } => {
                if let Err(e) = self.angebot_beantworten(&peer_id, offer).await {
                    self.link_abbrechen(&peer_id, e).await;
                }
            }

            SignalMessage::Answer {
                from: Some(peer_id),
                answer,
                ..
            } => {
                if let Err(e) = self.antwort_anwenden(&peer_id, answer).await {
                    self.link_abbrechen(&peer_id, e).await;
                }
            }

            SignalMessage::Ice {
                from: Some(peer_id),
                candidate,
                ..
            } => self.kandidat_anwenden(&peer_id, candidate).await,

            SignalMessage::Chat {
                sender, text, time, ..
            } => self.melden(MeshEreignis::Chat(ChatMessage { sender, text, time })),

            SignalMessage::Mute {
                from: Some(peer_id),
                muted,
                ..
            } => self.melden(MeshEreignis::PeerStumm {
                peer_id,
                stumm: muted,
            }),

            SignalMessage::Video {
                from: Some(peer_id),
                video_on,
                ..
            } => self.melden(MeshEreignis::PeerVideo { peer_id, video_an: video_on }),

            SignalMessage::PeerLeft { peer_id } => {
                tracing::info!(peer = %peer_id, "Peer hat den Raum verlassen");
                if let Some(mut link) = self.links.remove(&peer_id) {
                    link.schliessen().await;
                }
                self.namen.remove(&peer_id);
                self.melden(MeshEreignis::PeerVerlassen { peer_id });
            }

            andere => {
                tracing::debug!(art = andere.art(), "Relay-Nachricht ignoriert");
            }
        }
    }

    /// Initiiert Links zu allen bestehenden Mitgliedern
    async fn peers_verarbeiten(&mut self, peers: Vec<PeerInfo>) {
        let eigene_id = self.eigene_id().cloned();
        tracing::debug!(anzahl = peers.len(), "Mitgliederliste erhalten");

        for info in peers {
            if Some(&info.peer_id) == eigene_id.as_ref() {
                continue;
            }
            self.namen.insert(info.peer_id.clone(), info.name);
            if let Err(e) = self.angebot_senden(&info.peer_id).await {
                self.link_abbrechen(&info.peer_id, e).await;
            }
        }
    }

    /// Initiator-Seite: Link anlegen, Datenkanal oeffnen, Offer senden
    async fn angebot_senden(&mut self, peer_id: &PeerId) -> MeshResult<()> {
        self.link_erstellen(peer_id).await?;
        let transport = self.transport_von(peer_id)?;

        let kanal = transport
            .datenkanal_oeffnen(&self.config.datenkanal_label)
            .await?;
        if let Some(link) = self.links.get_mut(peer_id) {
            link.datenkanal_setzen(kanal);
        }

        let angebot = transport.angebot_erstellen().await?;
        self.zustand_wechseln(peer_id, LinkZustand::Connecting)?;

        let eigener_name = self
            .sitzung
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        self.senden(SignalMessage::offer_an(peer_id.clone(), angebot));
        self.senden(SignalMessage::peer_name_an(peer_id.clone(), eigener_name));
        tracing::debug!(peer = %peer_id, "Offer gesendet");
        Ok(())
    }

    /// Antwortende Seite: Remote setzen, Answer senden
    async fn angebot_beantworten(
        &mut self,
        peer_id: &PeerId,
        angebot: SessionDescription,
    ) -> MeshResult<()> {
        match self.links.get(peer_id).map(RemotePeerLink::zustand) {
            Some(LinkZustand::Idle) => {}
            Some(zustand) => {
                tracing::info!(peer = %peer_id, zustand = ?zustand, "Offer ersetzt bestehenden Link");
                self.link_erstellen(peer_id).await?;
            }
            None => self.link_erstellen(peer_id).await?,
        }

        self.zustand_wechseln(peer_id, LinkZustand::Connecting)?;
        let link = self.link_mut(peer_id)?;
        link.remote_setzen(angebot).await?;
        let antwort = link.transport().antwort_erstellen().await?;
        self.zustand_wechseln(peer_id, LinkZustand::Negotiated)?;

        self.senden(SignalMessage::answer_an(peer_id.clone(), antwort));
        tracing::debug!(peer = %peer_id, "Answer gesendet");
        Ok(())
    }

    async fn antwort_anwenden(
        &mut self,
        peer_id: &PeerId,
        antwort: SessionDescription,
    ) -> MeshResult<()> {
        let Some(link) = self.links.get_mut(peer_id) else {
            tracing::warn!(peer = %peer_id, "Answer ohne Link verworfen");
            return Ok(());
        };
        if link.zustand() != LinkZustand::Connecting {
            tracing::warn!(peer = %peer_id, zustand = ?link.zustand(), "Unerwartetes Answer ignoriert");
            return Ok(());
        }
        link.remote_setzen(antwort).await?;
        self.zustand_wechseln(peer_id, LinkZustand::Negotiated)
    }

    async fn kandidat_anwenden(&mut self, peer_id: &PeerId, kandidat: IceCandidate) {
        let Some(link) = self.links.get_mut(peer_id) else {
            tracing::warn!(peer = %peer_id, "ICE-Kandidat ohne Link verworfen");
            return;
        };
        if let Err(e) = link.kandidat(kandidat).await {
            self.link_abbrechen(peer_id, e).await;
        }
    }

    // -----------------------------------------------------------------------
    // Transport-Ereignisse
    // -----------------------------------------------------------------------

    async fn transport_ereignis(&mut self, ereignis: TransportEreignis) {
        let TransportEreignis {
            peer_id,
            generation,
            art,
        } = ereignis;

        let Some(link) = self.links.get_mut(&peer_id) else {
            tracing::debug!(peer = %peer_id, "Transport-Ereignis ohne Link verworfen");
            return;
        };
        if link.generation != generation {
            tracing::debug!(
                peer = %peer_id,
                generation,
                aktuell = link.generation,
                "Veraltetes Transport-Ereignis verworfen"
            );
            return;
        }

        match art {
            TransportEreignisArt::LokalerKandidat(kandidat) => {
                self.senden(SignalMessage::ice_an(peer_id, kandidat));
            }
            TransportEreignisArt::Verbunden => {
                if let Err(e) = self.zustand_wechseln(&peer_id, LinkZustand::Connected) {
                    tracing::debug!(peer = %peer_id, fehler = %e, "Verbunden-Meldung ignoriert");
                    return;
                }
                tracing::info!(peer = %peer_id, "Direktverbindung hergestellt");
                self.medien_melden(&peer_id);
            }
            TransportEreignisArt::Getrennt => {
                tracing::info!(peer = %peer_id, "Direktverbindung unterbrochen");
            }
            TransportEreignisArt::Fehlgeschlagen => {
                self.link_abbrechen(&peer_id, MeshError::transport("Verbindung fehlgeschlagen"))
                    .await;
            }
            TransportEreignisArt::RemoteStream(stream) => {
                link.stream_setzen(stream);
                self.medien_melden(&peer_id);
            }
            TransportEreignisArt::Datenkanal(kanal) => {
                tracing::debug!(peer = %peer_id, label = kanal.label(), "Datenkanal empfangen");
                link.datenkanal_setzen(kanal);
            }
            TransportEreignisArt::DatenkanalNachricht(text) => {
                match serde_json::from_str::<ChatMessage>(&text) {
                    Ok(nachricht) => self.melden(MeshEreignis::Chat(nachricht)),
                    Err(e) => {
                        tracing::warn!(peer = %peer_id, fehler = %e, "Ungueltige Datenkanal-Nachricht ignoriert");
                    }
                }
            }
        }
    }

    /// Meldet den Remote-Stream einmalig sobald der Link verbunden ist
    fn medien_melden(&mut self, peer_id: &PeerId) {
        let Some(link) = self.links.get_mut(peer_id) else {
            return;
        };
        if let Some(stream) = link.medien_bereit() {
            let name = if link.name.is_empty() {
                peer_id.to_string()
            } else {
                link.name.clone()
            };
            self.melden(MeshEreignis::PeerMedien {
                peer_id: peer_id.clone(),
                stream,
                name,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Lokale Aktionen
    // -----------------------------------------------------------------------

    /// Sendet eine Chat-Nachricht ueber alle offenen Datenkanaele
    ///
    /// Die Oberflaeche erhaelt die Nachricht genau einmal, unabhaengig von
    /// der Anzahl der Peers.
    pub fn sende_chat(&mut self, text: impl Into<String>) -> MeshResult<ChatMessage> {
        let sitzung = self
            .sitzung
            .as_ref()
            .ok_or_else(|| MeshError::sitzung("keine Sitzung"))?;
        let nachricht = ChatMessage {
            sender: sitzung.name.clone(),
            text: text.into(),
            time: chrono::Local::now().format("%H:%M").to_string(),
        };
        let json = serde_json::to_string(&nachricht)
            .map_err(|e| MeshError::transport(format!("Chat nicht serialisierbar: {e}")))?;

        let mut gesendet = 0usize;
        for link in self.links.values() {
            let Some(kanal) = link.datenkanal().filter(|k| k.ist_offen()) else {
                continue;
            };
            match kanal.senden(&json) {
                Ok(()) => gesendet += 1,
                Err(e) => tracing::warn!(peer = %link.peer_id, fehler = %e, "Chat nicht gesendet"),
            }
        }
        tracing::debug!(kanaele = gesendet, "Chat gesendet");

        self.melden(MeshEreignis::Chat(nachricht.clone()));
        Ok(nachricht)
    }

    /// Schaltet das Mikrofon um und gibt den neuen Zustand zurueck
    ///
    /// `None` wenn keine Audiospur erfasst wurde.
    pub fn audio_umschalten(&mut self) -> MeshResult<Option<bool>> {
        let an = self.spuren_umschalten(SpurArt::Audio)?;
        if let Some(an) = an {
            self.senden(SignalMessage::mute(!an));
        }
        Ok(an)
    }

    /// Schaltet die Kamera um und gibt den neuen Zustand zurueck
    pub fn video_umschalten(&mut self) -> MeshResult<Option<bool>> {
        let an = self.spuren_umschalten(SpurArt::Video)?;
        if let Some(an) = an {
            self.senden(SignalMessage::video(an));
        }
        Ok(an)
    }

    fn spuren_umschalten(&self, art: SpurArt) -> MeshResult<Option<bool>> {
        let sitzung = self
            .sitzung
            .as_ref()
            .ok_or_else(|| MeshError::sitzung("keine Sitzung"))?;
        Ok(sitzung.medien.umschalten(art))
    }

    /// Beendet die Sitzung (idempotent)
    ///
    /// Danach kann `start` eine neue Sitzung beginnen.
    pub async fn schliessen(&mut self) {
        let Some(sitzung) = self.sitzung.take() else {
            return;
        };
        if let Some(tx) = &sitzung.relay_tx {
            let _ = tx.send(SignalMessage::Leave);
        }

        for (_, mut link) in self.links.drain() {
            link.schliessen().await;
        }
        sitzung.medien.freigeben();
        self.namen.clear();
        while self.transport_rx.try_recv().is_ok() {}

        tracing::info!(raum = %sitzung.raum_id, peer = %sitzung.eigene_id, "Sitzung beendet");
    }

    // -----------------------------------------------------------------------
    // Hilfsfunktionen
    // -----------------------------------------------------------------------

    /// Legt einen neuen Link an; ein bestehender wird geschlossen
    async fn link_erstellen(&mut self, peer_id: &PeerId) -> MeshResult<()> {
        let (medien, ice_server) = match self.sitzung.as_ref() {
            Some(s) => (Arc::clone(&s.medien), s.ice_server.clone()),
            None => return Err(MeshError::sitzung("keine Sitzung")),
        };

        self.generation += 1;
        let generation = self.generation;
        let melder = TransportMelder::neu(peer_id.clone(), generation, self.transport_tx.clone());
        let transport = self
            .adapter
            .transport
            .transport_erstellen(peer_id, &ice_server, melder)
            .await?;

        let name = self.namen.get(peer_id).cloned().unwrap_or_default();
        let link = RemotePeerLink::neu(peer_id.clone(), name, generation, Arc::clone(&transport));
        if let Some(mut alt) = self.links.insert(peer_id.clone(), link) {
            alt.schliessen().await;
        }

        transport.lokale_medien_anhaengen(medien.spuren()).await
    }

    fn link_mut(&mut self, peer_id: &PeerId) -> MeshResult<&mut RemotePeerLink> {
        self.links
            .get_mut(peer_id)
            .ok_or_else(|| MeshError::sitzung(format!("kein Link zu {peer_id}")))
    }

    fn transport_von(&self, peer_id: &PeerId) -> MeshResult<Arc<dyn PeerTransport>> {
        self.links
            .get(peer_id)
            .map(|l| Arc::clone(l.transport()))
            .ok_or_else(|| MeshError::sitzung(format!("kein Link zu {peer_id}")))
    }

    fn zustand_wechseln(&mut self, peer_id: &PeerId, nach: LinkZustand) -> MeshResult<()> {
        self.link_mut(peer_id)?.wechseln(nach)?;
        self.melden(MeshEreignis::LinkZustand {
            peer_id: peer_id.clone(),
            zustand: nach,
        });
        Ok(())
    }

    /// Schliesst einen Link nach einem Fehler; andere Links bleiben bestehen
    async fn link_abbrechen(&mut self, peer_id: &PeerId, fehler: MeshError) {
        let fehler = fehler.fuer_peer(peer_id);
        tracing::warn!(peer = %peer_id, fehler = %fehler, "Link geschlossen");
        if let Some(mut link) = self.links.remove(peer_id) {
            link.schliessen().await;
        }
        self.melden(MeshEreignis::LinkGeschlossen {
            peer_id: peer_id.clone(),
            grund: fehler.to_string(),
        });
    }

    /// Sendet an den Relay (fire-and-forget)
    fn senden(&self, nachricht: SignalMessage) {
        let Some(tx) = self.sitzung.as_ref().and_then(|s| s.relay_tx.as_ref()) else {
            tracing::debug!(art = nachricht.art(), "Kein Relay, Nachricht verworfen");
            return;
        };
        if tx.send(nachricht).is_err() {
            tracing::debug!("Relay getrennt, Nachricht verworfen");
        }
    }

    fn melden(&self, ereignis: MeshEreignis) {
        if self.ereignisse.send(ereignis).is_err() {
            tracing::trace!("Kein Empfaenger fuer Mesh-Ereignisse");
        }
    }

    // -----------------------------------------------------------------------
    // Aktor
    // -----------------------------------------------------------------------

    /// Startet einen Task der den Orchestrator besitzt
    ///
    /// Der Task endet nach `Schliessen` oder wenn alle Handles verworfen
    /// wurden; in beiden Faellen wird die Sitzung geschlossen.
    pub fn spawnen(mut self) -> (MeshHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<MeshBefehl>();

        let task = tokio::spawn(async move {
            enum Schritt {
                Befehl(Option<MeshBefehl>),
                Eingabe(Option<Eingabe>),
            }

            loop {
                let schritt = if self.ist_aktiv() {
                    tokio::select! {
                        befehl = rx.recv() => Schritt::Befehl(befehl),
                        eingabe = self.naechste_eingabe() => Schritt::Eingabe(eingabe),
                    }
                } else {
                    Schritt::Befehl(rx.recv().await)
                };

                match schritt {
                    Schritt::Befehl(None) | Schritt::Befehl(Some(MeshBefehl::Schliessen)) => break,
                    Schritt::Befehl(Some(befehl)) => self.befehl_ausfuehren(befehl),
                    Schritt::Eingabe(Some(eingabe)) => {
                        if let Err(e) = self.eingabe_verarbeiten(eingabe).await {
                            tracing::warn!(fehler = %e, "Eingabe nicht verarbeitet");
                        }
                    }
                    Schritt::Eingabe(None) => {}
                }
            }

            self.schliessen().await;
        });

        (MeshHandle { tx }, task)
    }

    fn befehl_ausfuehren(&mut self, befehl: MeshBefehl) {
        let ergebnis = match befehl {
            MeshBefehl::SendeChat(text) => self.sende_chat(text).map(|_| ()),
            MeshBefehl::AudioUmschalten => self.audio_umschalten().map(|_| ()),
            MeshBefehl::VideoUmschalten => self.video_umschalten().map(|_| ()),
            MeshBefehl::Schliessen => Ok(()),
        };
        if let Err(e) = ergebnis {
            tracing::warn!(fehler = %e, "Befehl fehlgeschlagen");
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Befehle an einen gespawnten Orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshBefehl {
    SendeChat(String),
    AudioUmschalten,
    VideoUmschalten,
    Schliessen,
}

/// Steuert einen gespawnten Orchestrator
#[derive(Debug, Clone)]
pub struct MeshHandle {
    tx: mpsc::UnboundedSender<MeshBefehl>,
}

impl MeshHandle {
    /// `false` wenn der Orchestrator-Task bereits beendet ist
    pub fn senden(&self, befehl: MeshBefehl) -> bool {
        self.tx.send(befehl).is_ok()
    }

    pub fn sende_chat(&self, text: impl Into<String>) -> bool {
        self.senden(MeshBefehl::SendeChat(text.into()))
    }

    pub fn audio_umschalten(&self) -> bool {
        self.senden(MeshBefehl::AudioUmschalten)
    }

    pub fn video_umschalten(&self) -> bool {
        self.senden(MeshBefehl::VideoUmschalten)
    }

    pub fn schliessen(&self) -> bool {
        self.senden(MeshBefehl::Schliessen)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
