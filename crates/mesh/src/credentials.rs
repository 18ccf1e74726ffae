//! Zugangsdaten fuer NAT-Traversal (STUN/TURN)

use async_trait::async_trait;

use crate::config::{IceServer, MeshConfig};
use crate::error::MeshResult;

/// Liefert die ICE-Server fuer neue Verbindungen
///
/// Implementierungen koennen zeitlich begrenzte TURN-Zugangsdaten von
/// einem Dienst abrufen; `start` fragt einmal pro Sitzung.
#[async_trait]
pub trait ZugangsdatenQuelle: Send + Sync {
    async fn ice_server(&self) -> MeshResult<Vec<IceServer>>;
}

/// Feste ICE-Server aus der Konfiguration
#[derive(Debug, Clone)]
pub struct StatischeZugangsdaten {
    server: Vec<IceServer>,
}

impl StatischeZugangsdaten {
    pub fn neu(server: Vec<IceServer>) -> Self {
        Self { server }
    }

    pub fn aus_config(config: &MeshConfig) -> Self {
        Self::neu(config.ice_server())
    }
}

#[async_trait]
impl ZugangsdatenQuelle for StatischeZugangsdaten {
    async fn ice_server(&self) -> MeshResult<Vec<IceServer>> {
        Ok(self.server.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn statische_quelle_liefert_config() {
        let quelle = StatischeZugangsdaten::aus_config(&MeshConfig::default());
        let server = quelle.ice_server().await.unwrap();
        assert_eq!(server.len(), 1);
        assert!(server[0].urls[0].starts_with("stun:"));
    }
}
