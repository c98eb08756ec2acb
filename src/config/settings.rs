use serde::Deserialize;

/// Top-level configuration settings for the bridge binary.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub bridge: BridgeSettings,
    pub log: LogSettings,
}

/// Where the WebSocket bridge listens.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Advertised WebSocket path. Informational; any path is accepted.
    pub path: String,
}

/// Timing of the per-session demo traffic.
///
/// `reply_timeout_ms` bounds how long the remote handler waits for the
/// client to answer a request before giving up on that reply.
#[derive(Debug, Deserialize, Clone)]
pub struct BridgeSettings {
    pub ping_interval_ms: u64,
    pub request_delay_ms: u64,
    pub reply_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled in from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub bridge: Option<PartialBridgeSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBridgeSettings {
    pub ping_interval_ms: Option<u64>,
    pub request_delay_ms: Option<u64>,
    pub reply_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                path: "/ws".to_string(),
            },
            bridge: BridgeSettings {
                ping_interval_ms: 1000,
                request_delay_ms: 5000,
                reply_timeout_ms: 10_000,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Merge a partially specified configuration over the defaults.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server;
        let bridge = partial.bridge;
        let log = partial.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                path: server
                    .as_ref()
                    .and_then(|s| s.path.clone())
                    .unwrap_or(default.server.path),
            },
            bridge: BridgeSettings {
                ping_interval_ms: bridge
                    .as_ref()
                    .and_then(|b| b.ping_interval_ms)
                    .unwrap_or(default.bridge.ping_interval_ms),
                request_delay_ms: bridge
                    .as_ref()
                    .and_then(|b| b.request_delay_ms)
                    .unwrap_or(default.bridge.request_delay_ms),
                reply_timeout_ms: bridge
                    .as_ref()
                    .and_then(|b| b.reply_timeout_ms)
                    .unwrap_or(default.bridge.reply_timeout_ms),
            },
            log: LogSettings {
                level: log
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.log.level),
            },
        }
    }
}
