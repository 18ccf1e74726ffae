//! Lokale Medien (Kamera/Mikrofon)
//!
//! Die Erfassung selbst liefert ein Adapter (`MedienErfassung`). Der
//! Orchestrator haelt die erfassten Spuren in einem `LokaleMedien`-Handle,
//! haengt sie lesend an jeden Link und gibt sie genau einmal frei.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::MeshResult;

/// Art einer Medienspur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpurArt {
    Audio,
    Video,
}

/// Eine lokal erfasste Spur
pub trait MedienSpur: Send + Sync + fmt::Debug {
    fn art(&self) -> SpurArt;
    fn ist_aktiv(&self) -> bool;
    /// Aktiviert/deaktiviert die Spur ohne Neuverhandlung
    fn aktiv_setzen(&self, aktiv: bool);
    /// Beendet die Erfassung endgueltig
    fn stoppen(&self);
}

/// Erfasst lokale Medien
///
/// Ein Fehler (z.B. verweigerte Berechtigung) ist fatal fuer `start`.
#[async_trait]
pub trait MedienErfassung: Send + Sync {
    async fn erfassen(&self, audio: bool, video: bool) -> MeshResult<Vec<Arc<dyn MedienSpur>>>;
}

/// Besitzt die lokal erfassten Spuren einer Sitzung
#[derive(Debug)]
pub struct LokaleMedien {
    spuren: Vec<Arc<dyn MedienSpur>>,
    freigegeben: AtomicBool,
}

impl LokaleMedien {
    pub fn neu(spuren: Vec<Arc<dyn MedienSpur>>) -> Self {
        Self {
            spuren,
            freigegeben: AtomicBool::new(false),
        }
    }

    pub fn spuren(&self) -> &[Arc<dyn MedienSpur>] {
        &self.spuren
    }

    /// Schaltet alle Spuren einer Art um
    ///
    /// Gibt den neuen Zustand zurueck, `None` wenn es keine Spur dieser
    /// Art gibt. Massgeblich ist die erste Spur; alle folgen ihr.
    pub fn umschalten(&self, art: SpurArt) -> Option<bool> {
        let mut spuren = self.spuren.iter().filter(|s| s.art() == art).peekable();
        let neu = !spuren.peek()?.ist_aktiv();
        for spur in spuren {
            spur.aktiv_setzen(neu);
        }
        Some(neu)
    }

    /// Stoppt alle Spuren; nur der erste Aufruf wirkt
    pub fn freigeben(&self) -> bool {
        if self.freigegeben.swap(true, Ordering::AcqRel) {
            return false;
        }
        for spur in &self.spuren {
            spur.stoppen();
        }
        tracing::debug!(spuren = self.spuren.len(), "Lokale Medien freigegeben");
        true
    }

    pub fn ist_freigegeben(&self) -> bool {
        self.freigegeben.load(Ordering::Acquire)
    }
}

impl Drop for LokaleMedien {
    fn drop(&mut self) {
        self.freigeben();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speicher::SpeicherSpur;

    fn medien() -> (LokaleMedien, Arc<SpeicherSpur>, Arc<SpeicherSpur>) {
        let audio = Arc::new(SpeicherSpur::neu(SpurArt::Audio));
        let video = Arc::new(SpeicherSpur::neu(SpurArt::Video));
        let spuren: Vec<Arc<dyn MedienSpur>> = vec![audio.clone(), video.clone()];
        (LokaleMedien::neu(spuren), audio, video)
    }

    #[test]
    fn umschalten_betrifft_nur_eine_art() {
        let (m, audio, video) = medien();
        assert_eq!(m.umschalten(SpurArt::Audio), Some(false));
        assert!(!audio.ist_aktiv());
        assert!(video.ist_aktiv());
        assert_eq!(m.umschalten(SpurArt::Audio), Some(true));
        assert!(audio.ist_aktiv());
    }

    #[test]
    fn umschalten_ohne_spur() {
        let m = LokaleMedien::neu(Vec::new());
        assert_eq!(m.umschalten(SpurArt::Video), None);
    }

    #[test]
    fn freigeben_genau_einmal() {
        let (m, audio, video) = medien();
        assert!(m.freigeben());
        assert!(!m.freigeben());
        drop(m);
        assert_eq!(audio.stopp_anzahl(), 1);
        assert_eq!(video.stopp_anzahl(), 1);
    }
}
