//! Health-Check-Endpunkt fuer den meshcall-Relay
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime sowie Raum- und Peer-Anzahl

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub rooms: usize,
    pub peers: usize,
}

/// Quelle fuer den Live-Zustand des Relays
///
/// Wird vom Raum-Verzeichnis des Signaling-Crates implementiert.
pub trait StatusQuelle: Send + Sync + 'static {
    /// Anzahl existierender Raeume
    fn raum_anzahl(&self) -> usize;
    /// Anzahl der Peers ueber alle Raeume
    fn peer_anzahl(&self) -> usize;
    /// false wenn der Relay keine Verbindungen mehr annimmt (Shutdown)
    fn nimmt_verbindungen_an(&self) -> bool {
        true
    }
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub quelle: Arc<dyn StatusQuelle>,
}

impl HealthState {
    pub fn neu(quelle: Arc<dyn StatusQuelle>) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            quelle,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Erstellt die aktuelle Health-Antwort
    pub fn antwort(&self) -> HealthResponse {
        let status = if self.quelle.nimmt_verbindungen_an() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            rooms: self.quelle.raum_anzahl(),
            peers: self.quelle.peer_anzahl(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(quelle: Arc<dyn StatusQuelle>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(HealthState::neu(quelle))
}

/// `GET /health` – gibt den Relay-Status zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.antwort();
    let http_status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    struct TestQuelle {
        offen: AtomicBool,
    }

    impl StatusQuelle for TestQuelle {
        fn raum_anzahl(&self) -> usize {
            2
        }
        fn peer_anzahl(&self) -> usize {
            5
        }
        fn nimmt_verbindungen_an(&self) -> bool {
            self.offen.load(Ordering::Relaxed)
        }
    }

    fn quelle(offen: bool) -> Arc<TestQuelle> {
        Arc::new(TestQuelle {
            offen: AtomicBool::new(offen),
        })
    }

    #[test]
    fn antwort_enthaelt_raum_und_peer_zahlen() {
        let state = HealthState::neu(quelle(true));
        let antwort = state.antwort();
        assert_eq!(antwort.status, HealthStatus::Healthy);
        assert_eq!(antwort.rooms, 2);
        assert_eq!(antwort.peers, 5);
        assert!(antwort.uptime_seconds < 5); // Frisch erstellt
    }

    #[test]
    fn shutdown_meldet_unhealthy() {
        let state = HealthState::neu(quelle(false));
        assert_eq!(state.antwort().status, HealthStatus::Unhealthy);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            rooms: 1,
            peers: 3,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"rooms\":1"));
        assert!(json.contains("\"peers\":3"));
    }

    #[tokio::test]
    async fn health_endpunkt_liefert_json() {
        let app = health_router(quelle(true));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let antwort: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(antwort.peers, 5);
    }

    #[tokio::test]
    async fn health_endpunkt_503_bei_shutdown() {
        let app = health_router(quelle(false));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
