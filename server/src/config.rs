//! Relay-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Relay ohne Konfigurationsdatei
//! lauffaehig ist.

use meshcall_observability::logging::{log_format_gueltig, log_level_gueltig};
use meshcall_protocol::wire::DEFAULT_MAX_NACHRICHT_BYTES;
use meshcall_signaling::{
    IdStrategie, SignalingConfig, DEFAULT_SEND_QUEUE_GROESSE, DEFAULT_WS_PFAD,
};
use serde::{Deserialize, Serialize};

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG_PFAD: &str = "MESHCALL_CONFIG";
/// Standardpfad der Konfigurationsdatei
pub const DEFAULT_CONFIG_PFAD: &str = "config.toml";

/// Vollstaendige Relay-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Relays
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen (0 = unbegrenzt)
    pub max_clients: usize,
    /// Maximale Peers pro Raum (0 = unbegrenzt)
    pub max_peers_pro_raum: usize,
    /// Vergabe der Peer-IDs: "sequenziell" oder "zufaellig"
    pub id_strategie: IdStrategie,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "meshcall Relay".into(),
            max_clients: 512,
            max_peers_pro_raum: 0,
            id_strategie: IdStrategie::default(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer HTTP/WebSocket
    pub port: u16,
    /// Pfad des Signaling-Endpunkts
    pub ws_pfad: String,
    /// Maximale Groesse einer eingehenden Nachricht
    pub max_nachrichten_bytes: usize,
    /// Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Ping-Intervall
    pub keepalive_sek: u64,
    /// Verbindung gilt nach dieser Zeit ohne Lebenszeichen als getrennt
    pub verbindungs_timeout_sek: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            ws_pfad: DEFAULT_WS_PFAD.into(),
            max_nachrichten_bytes: DEFAULT_MAX_NACHRICHT_BYTES,
            send_queue_groesse: DEFAULT_SEND_QUEUE_GROESSE,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte die serde allein nicht abfangen kann
    ///
    /// Unbekannte Log-Einstellungen sind nur eine Warnung; `EnvFilter`
    /// versteht auch komplexere Direktiven.
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.netzwerk.send_queue_groesse == 0 {
            anyhow::bail!("netzwerk.send_queue_groesse muss groesser als 0 sein");
        }
        if self.netzwerk.keepalive_sek == 0 {
            anyhow::bail!("netzwerk.keepalive_sek muss groesser als 0 sein");
        }
        if self.netzwerk.verbindungs_timeout_sek <= self.netzwerk.keepalive_sek {
            anyhow::bail!("netzwerk.verbindungs_timeout_sek muss groesser als keepalive_sek sein");
        }
        if !self.netzwerk.ws_pfad.starts_with('/') {
            anyhow::bail!("netzwerk.ws_pfad muss mit '/' beginnen");
        }
        if !log_level_gueltig(&self.logging.level) {
            tracing::warn!(level = %self.logging.level, "Unbekanntes Log-Level, wird als Filter-Direktive verwendet");
        }
        if !log_format_gueltig(&self.logging.format) {
            tracing::warn!(format = %self.logging.format, "Unbekanntes Log-Format, verwende text");
        }
        Ok(())
    }

    /// Pfad aus `MESHCALL_CONFIG`, sonst `config.toml`
    pub fn pfad_aus_umgebung() -> String {
        std::env::var(ENV_CONFIG_PFAD).unwrap_or_else(|_| DEFAULT_CONFIG_PFAD.into())
    }

    /// Bind-Adresse fuer HTTP/WebSocket
    pub fn relay_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Bind-Adresse fuer den Observability-Server
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }

    /// Leitet die Relay-Konfiguration ab
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            server_name: self.server.name.clone(),
            max_clients: self.server.max_clients,
            max_peers_pro_raum: self.server.max_peers_pro_raum,
            id_strategie: self.server.id_strategie,
            ws_pfad: self.netzwerk.ws_pfad.clone(),
            max_nachrichten_bytes: self.netzwerk.max_nachrichten_bytes,
            send_queue_groesse: self.netzwerk.send_queue_groesse,
            keepalive_sek: self.netzwerk.keepalive_sek,
            verbindungs_timeout_sek: self.netzwerk.verbindungs_timeout_sek,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_clients, 512);
        assert_eq!(cfg.server.id_strategie, IdStrategie::Sequenziell);
        assert_eq!(cfg.netzwerk.port, 3000);
        assert_eq!(cfg.netzwerk.ws_pfad, "/api/ws/signaling");
        assert_eq!(cfg.netzwerk.send_queue_groesse, 256);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.observability.aktiviert);
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.relay_bind_adresse(), "0.0.0.0:3000");
        assert_eq!(cfg.observability_bind_adresse(), "0.0.0.0:9300");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Relay"
            max_peers_pro_raum = 8
            id_strategie = "zufaellig"

            [netzwerk]
            port = 8080
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Relay");
        assert_eq!(cfg.server.max_peers_pro_raum, 8);
        assert_eq!(cfg.server.id_strategie, IdStrategie::Zufaellig);
        assert_eq!(cfg.netzwerk.port, 8080);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.server.max_clients, 512);
        assert_eq!(cfg.netzwerk.keepalive_sek, 30);
    }

    #[test]
    fn signaling_config_uebernimmt_werte() {
        let mut cfg = ServerConfig::default();
        cfg.server.max_clients = 3;
        cfg.netzwerk.verbindungs_timeout_sek = 7;
        let sc = cfg.signaling_config();
        assert_eq!(sc.max_clients, 3);
        assert_eq!(sc.verbindungs_timeout_sek, 7);
        assert_eq!(sc.ws_pfad, DEFAULT_WS_PFAD);
    }

    #[test]
    fn pruefen_lehnt_ungueltige_werte_ab() {
        assert!(ServerConfig::default().pruefen().is_ok());

        let mut cfg = ServerConfig::default();
        cfg.netzwerk.send_queue_groesse = 0;
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.netzwerk.verbindungs_timeout_sek = cfg.netzwerk.keepalive_sek;
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.netzwerk.ws_pfad = "ws".into();
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.logging.level = "meshcall_signaling=debug".into();
        assert!(cfg.pruefen().is_ok());
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/meshcall.toml").unwrap();
        assert_eq!(cfg.netzwerk.port, 3000);
    }

    #[test]
    fn ungueltige_datei_ist_fehler() {
        let pfad = std::env::temp_dir().join(format!("meshcall-test-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[server\nname = ").unwrap();
        let ergebnis = ServerConfig::laden(pfad.to_str().unwrap());
        std::fs::remove_file(&pfad).ok();
        assert!(ergebnis.is_err());
    }
}
