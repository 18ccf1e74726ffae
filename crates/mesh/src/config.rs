//! Client-Konfiguration fuer den Mesh-Orchestrator
//!
//! Die Werte kommen aus dem Code oder aus der Umgebung:
//! - `MESHCALL_RELAY_URL`: WebSocket-URL oder HTTP-Basis des Relays
//! - `MESHCALL_TURN_URLS`: kommagetrennte TURN-URLs
//! - `MESHCALL_TURN_USERNAME` / `MESHCALL_TURN_CREDENTIAL`

use serde::{Deserialize, Serialize};

/// Standard-STUN-Server
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";
/// Label des Chat-Datenkanals
pub const DEFAULT_DATENKANAL_LABEL: &str = "chat";
/// Pfad des Signaling-Endpunkts am Relay
pub const SIGNALING_PFAD: &str = "/api/ws/signaling";

pub const ENV_RELAY_URL: &str = "MESHCALL_RELAY_URL";
pub const ENV_TURN_URLS: &str = "MESHCALL_TURN_URLS";
pub const ENV_TURN_USERNAME: &str = "MESHCALL_TURN_USERNAME";
pub const ENV_TURN_CREDENTIAL: &str = "MESHCALL_TURN_CREDENTIAL";

/// Ein ICE-Server (STUN oder TURN)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// STUN-Server ohne Zugangsdaten
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Konfiguration des Orchestrators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// WebSocket-URL des Relays (`ws://host:port/api/ws/signaling`)
    pub relay_url: String,
    pub stun_urls: Vec<String>,
    pub turn_urls: Vec<String>,
    pub turn_username: Option<String>,
    pub turn_credential: Option<String>,
    /// Label des Datenkanals den der Initiator oeffnet
    pub datenkanal_label: String,
    /// Wartezeit auf die `id`-Antwort in `start`
    pub start_timeout_sek: u64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            relay_url: relay_url_aus_basis("http://localhost:3000"),
            stun_urls: vec![DEFAULT_STUN_URL.to_string()],
            turn_urls: Vec::new(),
            turn_username: None,
            turn_credential: None,
            datenkanal_label: DEFAULT_DATENKANAL_LABEL.to_string(),
            start_timeout_sek: 10,
        }
    }
}

impl MeshConfig {
    /// Erstellt eine Konfiguration fuer eine Relay-URL
    pub fn fuer_relay(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            ..Self::default()
        }
    }

    /// Liest Relay-URL und TURN-Daten aus der Umgebung
    ///
    /// Nicht gesetzte Variablen behalten ihren Standardwert.
    pub fn aus_umgebung() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENV_RELAY_URL) {
            config.relay_url = if url.starts_with("ws") {
                url
            } else {
                relay_url_aus_basis(&url)
            };
        }
        if let Ok(urls) = std::env::var(ENV_TURN_URLS) {
            config.turn_urls = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }
        config.turn_username = std::env::var(ENV_TURN_USERNAME).ok();
        config.turn_credential = std::env::var(ENV_TURN_CREDENTIAL).ok();
        config
    }

    /// ICE-Server aus der Konfiguration
    ///
    /// TURN wird nur aufgenommen wenn URLs, Benutzername und Passwort
    /// gesetzt sind.
    pub fn ice_server(&self) -> Vec<IceServer> {
        let mut server: Vec<IceServer> = self.stun_urls.iter().map(IceServer::stun).collect();
        if let (false, Some(username), Some(credential)) = (
            self.turn_urls.is_empty(),
            self.turn_username.as_ref(),
            self.turn_credential.as_ref(),
        ) {
            server.push(IceServer {
                urls: self.turn_urls.clone(),
                username: Some(username.clone()),
                credential: Some(credential.clone()),
            });
        }
        server
    }
}

/// Baut die Signaling-URL aus einer HTTP-Basis (`http` -> `ws`)
pub fn relay_url_aus_basis(basis: &str) -> String {
    let basis = basis.trim_end_matches('/');
    let ws_basis = match basis.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => basis.to_string(),
    };
    format!("{ws_basis}{SIGNALING_PFAD}")
}
