//! Link zu einem Remote-Peer
//!
//! ## Zustandsautomat
//! ```text
//! Idle -> Connecting -> Negotiated -> Connected
//!   \         \             \            \
//!    +---------+-------------+------------+--> Closed
//! ```
//! Der Zustand laeuft nur vorwaerts; `Closed` ist endgueltig.
//!
//! ICE-Kandidaten der Gegenseite werden gepuffert bis eine
//! Remote-Beschreibung gesetzt ist, und dann in Eingangsreihenfolge
//! angewendet.

use meshcall_core::types::PeerId;
use meshcall_protocol::{IceCandidate, SessionDescription};
use std::sync::Arc;

use crate::error::{MeshError, MeshResult};
use crate::transport::{DatenKanal, PeerTransport, RemoteStream};

/// Verhandlungszustand eines Links
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkZustand {
    Idle,
    Connecting,
    Negotiated,
    Connected,
    Closed,
}

impl LinkZustand {
    /// Prueft ob ein Uebergang erlaubt ist (nur vorwaerts)
    pub fn kann_wechseln_zu(self, nach: LinkZustand) -> bool {
        self != Self::Closed && nach > self
    }
}

/// Link zu genau einem Remote-Peer
pub struct RemotePeerLink {
    pub peer_id: PeerId,
    pub name: String,
    /// Unterscheidet ersetzte Links desselben Peers
    pub generation: u64,
    transport: Arc<dyn PeerTransport>,
    datenkanal: Option<Arc<dyn DatenKanal>>,
    zustand: LinkZustand,
    remote_gesetzt: bool,
    ice_puffer: Vec<IceCandidate>,
    stream: Option<Arc<dyn RemoteStream>>,
    medien_gemeldet: bool,
}

impl RemotePeerLink {
    pub fn neu(
        peer_id: PeerId,
        name: String,
        generation: u64,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            peer_id,
            name,
            generation,
            transport,
            datenkanal: None,
            zustand: LinkZustand::Idle,
            remote_gesetzt: false,
            ice_puffer: Vec::new(),
            stream: None,
            medien_gemeldet: false,
        }
    }

    pub fn zustand(&self) -> LinkZustand {
        self.zustand
    }

    pub fn transport(&self) -> &Arc<dyn PeerTransport> {
        &self.transport
    }

    pub fn datenkanal(&self) -> Option<&Arc<dyn DatenKanal>> {
        self.datenkanal.as_ref()
    }

    pub fn datenkanal_setzen(&mut self, kanal: Arc<dyn DatenKanal>) {
        self.datenkanal = Some(kanal);
    }

    pub fn stream_setzen(&mut self, stream: Arc<dyn RemoteStream>) {
        self.stream = Some(stream);
        // Neuer Stream wird erneut gemeldet
        self.medien_gemeldet = false;
    }

    pub fn gepufferte_kandidaten(&self) -> usize {
        self.ice_puffer.len()
    }

    /// Wechselt den Zustand (nur vorwaerts)
    pub fn wechseln(&mut self, nach: LinkZustand) -> MeshResult<()> {
        if !self.zustand.kann_wechseln_zu(nach) {
            return Err(MeshError::Zustandsuebergang {
                von: self.zustand,
                nach,
            });
        }
        tracing::debug!(peer = %self.peer_id, von = ?self.zustand, nach = ?nach, "Link-Zustand");
        self.zustand = nach;
        Ok(())
    }

    /// Setzt die Remote-Beschreibung und wendet gepufferte Kandidaten an
    pub async fn remote_setzen(&mut self, beschreibung: SessionDescription) -> MeshResult<()> {
        self.transport.remote_setzen(beschreibung).await?;
        self.remote_gesetzt = true;

        let puffer = std::mem::take(&mut self.ice_puffer);
        if !puffer.is_empty() {
            tracing::debug!(peer = %self.peer_id, anzahl = puffer.len(), "Gepufferte ICE-Kandidaten anwenden");
        }
        for kandidat in puffer {
            self.transport.kandidat_hinzufuegen(kandidat).await?;
        }
        Ok(())
    }

    /// Wendet einen Kandidaten an oder puffert ihn
    pub async fn kandidat(&mut self, kandidat: IceCandidate) -> MeshResult<()> {
        if self.remote_gesetzt {
            self.transport.kandidat_hinzufuegen(kandidat).await
        } else {
            self.ice_puffer.push(kandidat);
            Ok(())
        }
    }

    /// Gibt den Stream zurueck sobald er angezeigt werden kann (einmalig)
    pub fn medien_bereit(&mut self) -> Option<Arc<dyn RemoteStream>> {
        if self.zustand != LinkZustand::Connected || self.medien_gemeldet {
            return None;
        }
        let stream = self.stream.clone()?;
        self.medien_gemeldet = true;
        Some(stream)
    }

    /// Schliesst den Link (idempotent)
    pub async fn schliessen(&mut self) {
        if self.zustand == LinkZustand::Closed {
            return;
        }
        self.zustand = LinkZustand::Closed;
        if let Some(kanal) = self.datenkanal.take() {
            kanal.schliessen();
        }
        self.ice_puffer.clear();
        self.transport.schliessen().await;
        tracing::debug!(peer = %self.peer_id, "Link geschlossen");
    }
}
