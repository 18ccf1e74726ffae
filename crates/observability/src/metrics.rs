//! Prometheus-kompatible Metriken fuer den meshcall-Relay
//!
//! Registrierte Metriken:
//! - `meshcall_connected_peers` – Gauge: Peers in Raeumen
//! - `meshcall_rooms_active` – Gauge: Existierende Raeume
//! - `meshcall_joins_total` – Counter: Raum-Beitritte
//! - `meshcall_messages_routed_total` – Counter: Weitergeleitete Nachrichten
//! - `meshcall_messages_broadcast_total` – Counter: Broadcast-Zustellungen
//! - `meshcall_messages_dropped_total` – Counter: Verworfene Nachrichten (grund)

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Gruende fuer verworfene Nachrichten (Label `grund`)
pub mod grund {
    /// Unparsebar oder unbekannter Typ
    pub const UNGUELTIG: &str = "ungueltig";
    /// Adressat nicht im Raum
    pub const ZIEL_FEHLT: &str = "ziel_fehlt";
    /// Send-Queue des Empfaengers voll
    pub const QUEUE_VOLL: &str = "queue_voll";
    /// Nachricht vor `join`
    pub const NICHT_BEIGETRETEN: &str = "nicht_beigetreten";
}

/// Alle Relay-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Zaehler.
#[derive(Clone)]
pub struct RelayMetriken {
    pub registry: Arc<Registry>,

    pub connected_peers: IntGauge,
    pub rooms_active: IntGauge,
    pub joins_total: IntCounter,
    pub messages_routed_total: IntCounter,
    pub messages_broadcast_total: IntCounter,
    pub messages_dropped_total: IntCounterVec,
}

impl RelayMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_peers = IntGauge::with_opts(Opts::new(
            "meshcall_connected_peers",
            "Anzahl der Peers in Raeumen",
        ))?;
        registry.register(Box::new(connected_peers.clone()))?;

        let rooms_active = IntGauge::with_opts(Opts::new(
            "meshcall_rooms_active",
            "Anzahl existierender Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let joins_total = IntCounter::with_opts(Opts::new(
            "meshcall_joins_total",
            "Gesamtanzahl der Raum-Beitritte",
        ))?;
        registry.register(Box::new(joins_total.clone()))?;

        let messages_routed_total = IntCounter::with_opts(Opts::new(
            "meshcall_messages_routed_total",
            "Gesamtanzahl weitergeleiteter Nachrichten",
        ))?;
        registry.register(Box::new(messages_routed_total.clone()))?;

        let messages_broadcast_total = IntCounter::with_opts(Opts::new(
            "meshcall_messages_broadcast_total",
            "Gesamtanzahl der Broadcast-Zustellungen",
        ))?;
        registry.register(Box::new(messages_broadcast_total.clone()))?;

        let messages_dropped_total = IntCounterVec::new(
            Opts::new(
                "meshcall_messages_dropped_total",
                "Gesamtanzahl verworfener Nachrichten",
            ),
            &["grund"],
        )?;
        registry.register(Box::new(messages_dropped_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_peers,
            rooms_active,
            joins_total,
            messages_routed_total,
            messages_broadcast_total,
            messages_dropped_total,
        })
    }

    /// Zaehlt eine verworfene Nachricht
    pub fn verworfen(&self, grund: &str) {
        self.messages_dropped_total.with_label_values(&[grund]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RelayMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
