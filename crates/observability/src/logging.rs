//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `MC_LOG_LEVEL`: Log-Level bzw. EnvFilter-Direktive, Standard: info
//! - `MC_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Die Umgebungsvariablen haben Vorrang vor der Konfigurationsdatei.

use tracing_subscriber::{fmt, EnvFilter};

/// Name der Umgebungsvariable fuer das Log-Level
pub const ENV_LOG_LEVEL: &str = "MC_LOG_LEVEL";
/// Name der Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "MC_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Liest `MC_LOG_LEVEL` und `MC_LOG_FORMAT` aus der Umgebung.
/// Faellt auf die uebergebenen Werte und zuletzt auf `info` zurueck.
/// Ein zweiter Aufruf (z.B. in Tests) ist ein No-Op.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| format.to_string());

    let ergebnis = match format_env.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging war bereits initialisiert");
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
