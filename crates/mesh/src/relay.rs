//! Verbindung zum Signaling-Relay
//!
//! `RelayVerbinder` oeffnet die Verbindung und liefert zwei Kanaele:
//! ausgehende Nachrichten (fire-and-forget) und eingehende Nachrichten.
//! Endet der Eingangskanal, ist die Relay-Verbindung weg.
//!
//! `WebSocketVerbinder` ist die tokio-tungstenite-Implementierung: je ein
//! Task zum Schreiben und zum Lesen, verbunden ueber mpsc-Kanaele.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use meshcall_core::MeshcallError;
use meshcall_protocol::wire::{dekodieren, kodieren};
use meshcall_protocol::SignalMessage;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::MeshResult;

/// Groesse der Eingangs-Queue
const EINGANG_QUEUE_GROESSE: usize = 64;

/// Offene Relay-Verbindung
#[derive(Debug)]
pub struct RelayVerbindung {
    /// Ausgehend; Drop schliesst die Verbindung
    pub sender: mpsc::UnboundedSender<SignalMessage>,
    /// Eingehend; `None` heisst getrennt
    pub empfaenger: mpsc::Receiver<SignalMessage>,
}

/// Oeffnet Verbindungen zum Relay
#[async_trait]
pub trait RelayVerbinder: Send + Sync {
    async fn verbinden(&self, url: &str) -> MeshResult<RelayVerbindung>;
}

/// Relay-Verbindung ueber WebSocket
#[derive(Debug, Default, Clone)]
pub struct WebSocketVerbinder;

impl WebSocketVerbinder {
    pub fn neu() -> Self {
        Self
    }
}

#[async_trait]
impl RelayVerbinder for WebSocketVerbinder {
    async fn verbinden(&self, url: &str) -> MeshResult<RelayVerbindung> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| MeshcallError::Verbindung(format!("{url}: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        tracing::info!(url = %url, "Relay-Verbindung hergestellt");

        let (ausgang_tx, mut ausgang_rx) = mpsc::unbounded_channel::<SignalMessage>();
        let (eingang_tx, eingang_rx) = mpsc::channel::<SignalMessage>(EINGANG_QUEUE_GROESSE);

        // Ausgehende Nachrichten
        tokio::spawn(async move {
            while let Some(nachricht) = ausgang_rx.recv().await {
                let text = match kodieren(&nachricht) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::error!(fehler = %e, "Kodieren fehlgeschlagen");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    tracing::warn!(fehler = %e, "Senden an Relay fehlgeschlagen");
                    return;
                }
            }
            // Sender verworfen: sauber schliessen
            let _ = write.send(Message::Close(None)).await;
            tracing::debug!("Relay-Schreib-Task beendet");
        });

        // Eingehende Nachrichten
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match dekodieren(&text) {
                        Ok(nachricht) => {
                            if eingang_tx.send(nachricht).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(fehler = %e, "Ungueltige Nachricht vom Relay verworfen");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(fehler = %e, "Relay-Lesefehler");
                        break;
                    }
                }
            }
            tracing::info!("Relay-Verbindung beendet");
        });

        Ok(RelayVerbindung {
            sender: ausgang_tx,
            empfaenger: eingang_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshError;

    #[tokio::test]
    async fn verbinden_ohne_relay_schlaegt_fehl() {
        // Port 1 ist praktisch nie offen
        let ergebnis = WebSocketVerbinder::neu()
            .verbinden("ws://127.0.0.1:1/api/ws/signaling")
            .await;
        match ergebnis {
            Err(MeshError::Relay(e)) => assert!(e.ist_netzwerkfehler()),
            andere => panic!("Erwartet Relay-Fehler, erhalten: {andere:?}"),
        }
    }
}
