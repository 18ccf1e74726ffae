//! WebSocket-Listener – Nimmt eingehende Signaling-Verbindungen an
//!
//! Der SignalingServer stellt den WebSocket-Endpunkt per axum bereit und
//! startet fuer jede angenommene Verbindung eine `PeerConnection` in einem
//! eigenen tokio-Task.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::connection::{PeerConnection, VerbindungsPlatz};
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// WebSocket-Signaling-Server
pub struct SignalingServer {
    state: Arc<SignalingState>,
}

impl SignalingServer {
    /// Erstellt einen neuen SignalingServer
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Gibt den geteilten Relay-Zustand zurueck
    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    /// Router mit dem WebSocket-Endpunkt unter `ws_pfad`
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.state.config.ws_pfad, get(ws_handler))
            .with_state(Arc::clone(&self.state))
    }

    /// Startet den Accept-Loop auf einem bereits gebundenen Listener
    ///
    /// Laeuft bis `SignalingState::herunterfahren` aufgerufen wird. Offene
    /// Verbindungen werden dabei ueber das Shutdown-Signal geschlossen.
    pub async fn starten(self, listener: TcpListener) -> SignalingResult<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            adresse = %addr,
            pfad = %self.state.config.ws_pfad,
            relay = %self.state.config.server_name,
            "Signaling-Server gestartet"
        );

        let mut shutdown_rx = self.state.shutdown_abonnieren();
        let app = self.router();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            // Fehler heisst: State wurde verworfen, ebenfalls beenden
            let _ = shutdown_rx.wait_for(|aktiv| *aktiv).await;
        })
        .await?;

        tracing::info!("Signaling-Server gestoppt");
        Ok(())
    }
}

/// `GET <ws_pfad>` – Upgrade auf WebSocket
///
/// Lehnt mit 503 ab wenn der Relay herunterfaehrt oder `max_clients`
/// erreicht ist.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<SignalingState>>,
) -> Response {
    if state.faehrt_herunter() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Relay faehrt herunter").into_response();
    }

    let Some(platz) = VerbindungsPlatz::reservieren(&state) else {
        tracing::warn!(
            peer = %peer_addr,
            max = state.config.max_clients,
            "Verbindungslimit erreicht, Upgrade abgelehnt"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Relay ist voll").into_response();
    };

    let max_bytes = state.config.max_nachrichten_bytes;
    ws.max_message_size(max_bytes)
        .max_frame_size(max_bytes)
        .on_failed_upgrade(move |e| {
            tracing::warn!(peer = %peer_addr, fehler = %e, "WebSocket-Upgrade fehlgeschlagen");
        })
        .on_upgrade(move |socket| PeerConnection::neu(state, peer_addr, platz).verarbeiten(socket))
}
