//! meshcall-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Signaling-Relay und Observability-Server und
//! stellt den Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use meshcall_observability::{observability_server_starten, RelayMetriken, StatusQuelle};
use meshcall_signaling::{SignalingServer, SignalingState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Haelt den laufenden Relay zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und Relay-Zustand anlegen
    /// 2. Observability-Server starten (falls aktiviert)
    /// 3. WebSocket-Listener binden und Relay starten
    /// 4. Auf Ctrl-C warten, dann alle Verbindungen schliessen
    pub async fn starten(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.relay_bind_adresse())
            .await
            .with_context(|| format!("Bind auf {} fehlgeschlagen", self.config.relay_bind_adresse()))?;
        self.starten_mit(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Startet auf einem gebundenen Listener und faehrt herunter sobald
    /// `shutdown` fertig ist
    pub async fn starten_mit(
        self,
        listener: TcpListener,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<()> {
        let metriken = RelayMetriken::neu()?;
        let state = SignalingState::neu(self.config.signaling_config(), metriken.clone());

        tracing::info!(
            relay = %self.config.server.name,
            adresse = %listener.local_addr()?,
            ids = ?self.config.server.id_strategie,
            "Relay startet"
        );

        if self.config.observability.aktiviert {
            let addr: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let quelle: Arc<dyn StatusQuelle> = state.clone();
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, quelle, metriken).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let server = SignalingServer::neu(Arc::clone(&state));
        let relay = tokio::spawn(server.starten(listener));

        shutdown.await;
        tracing::info!("Shutdown-Signal empfangen, Relay wird beendet");
        state.herunterfahren();

        relay
            .await
            .context("Relay-Task abgebrochen")?
            .context("Relay-Fehler")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_faehrt_nach_signal_herunter() {
        let mut config = ServerConfig::default();
        config.observability.aktiviert = false;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(Server::neu(config).starten_mit(listener, async {
            let _ = rx.await;
        }));

        // Relay nimmt Verbindungen an
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_ok());

        tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
