use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub environment: String,
}

/// Where the server binds, how many connections it accepts and which
/// directory it serves static files from.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub static_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`. The flat `port`,
/// `log_level` and `static_path` keys (`APP_PORT`, `APP_LOG_LEVEL`,
/// `APP_STATIC_PATH`) are shorthands; the nested keys win when both are set.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub log: Option<PartialLogSettings>,
    pub environment: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub static_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_connections: Option<usize>,
    pub static_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 3501,
                max_connections: 1000,
                static_path: "assets".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
            environment: "dev".to_string(),
        }
    }
}

impl Settings {
    /// Overlay whatever `partial` specifies onto the defaults.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();

        Settings {
            server: ServerSettings {
                host: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.port)
                    .or(partial.port)
                    .unwrap_or(default.server.port),
                max_connections: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.max_connections)
                    .unwrap_or(default.server.max_connections),
                static_path: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.static_path.clone())
                    .or(partial.static_path)
                    .unwrap_or(default.server.static_path),
            },
            log: LogSettings {
                level: partial
                    .log
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .or(partial.log_level)
                    .unwrap_or(default.log.level),
            },
            environment: partial.environment.unwrap_or(default.environment),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
