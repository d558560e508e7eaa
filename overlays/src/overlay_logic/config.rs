use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lib_overlay::transport::{Endpoint, TransportConfig};
use lib_overlay::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "overlay_client.conf";

/// Where rendered elements go.
#[derive(ValueEnum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Colored element updates on stdout.
    #[default]
    Console,
    /// One text file per element, for streaming software text sources.
    File,
    /// Keep state in memory only (connection testing).
    Memory,
}

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Telemetry overlay client", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "OVERLAY_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "OVERLAY_URL", help = "Full WebSocket URL of the telemetry server (overrides host/port/path).")]
    pub url: Option<String>,

    #[clap(long, env = "OVERLAY_HOST", help = "Telemetry server host.")]
    pub host: Option<String>,

    #[clap(long, env = "OVERLAY_PORT", help = "Telemetry server port.")]
    pub port: Option<u16>,

    #[clap(long, env = "OVERLAY_PATH", help = "Telemetry server WebSocket path.")]
    pub path: Option<String>,

    #[clap(long, env = "OVERLAY_BINDINGS_PATH", help = "Path to the JSON binding file (see presets/).")]
    pub bindings_path: Option<PathBuf>,

    #[clap(long, env = "OVERLAY_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "OVERLAY_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error, off).")]
    pub log_level: Option<String>,

    #[clap(long, env = "OVERLAY_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds for reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "OVERLAY_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds for reconnect attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[clap(long, env = "OVERLAY_HEARTBEAT_THRESHOLD_SECONDS", help = "Seconds without any frame before the connection is considered lost (0 disables).")]
    pub heartbeat_threshold_seconds: Option<u64>,

    #[clap(long, env = "OVERLAY_FRAME_INTERVAL_MS", help = "Animation frame interval in milliseconds.")]
    pub frame_interval_ms: Option<u64>,

    #[clap(long, env = "OVERLAY_CLOSE_TIMEOUT_MS", help = "Maximum milliseconds spent closing the connection on shutdown.")]
    pub close_timeout_ms: Option<u64>,

    #[clap(long, env = "OVERLAY_FAREWELL_MESSAGE", help = "Text frame sent to the server on shutdown (empty disables).")]
    pub farewell_message: Option<String>,

    #[clap(long, value_enum, env = "OVERLAY_SINK", help = "Render target.")]
    pub sink: Option<SinkKind>,

    #[clap(long, env = "OVERLAY_OUTPUT_DIR", help = "Output directory of the file sink.")]
    pub output_dir: Option<PathBuf>,

    #[clap(long, env = "OVERLAY_RESET_ON_RECONNECT", help = "Forget the last snapshot when the connection comes back (true/false).")]
    pub reset_on_reconnect: Option<bool>,

    #[clap(long, env = "OVERLAY_SEND_BACKLOG_LIMIT", help = "Outbound frames kept while the first connection is being established.")]
    pub send_backlog_limit: Option<usize>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            url: other.url.or(self.url),
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            path: other.path.or(self.path),
            bindings_path: other.bindings_path.or(self.bindings_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            heartbeat_threshold_seconds: other.heartbeat_threshold_seconds.or(self.heartbeat_threshold_seconds),
            frame_interval_ms: other.frame_interval_ms.or(self.frame_interval_ms),
            close_timeout_ms: other.close_timeout_ms.or(self.close_timeout_ms),
            farewell_message: other.farewell_message.or(self.farewell_message),
            sink: other.sink.or(self.sink),
            output_dir: other.output_dir.or(self.output_dir),
            reset_on_reconnect: other.reset_on_reconnect.or(self.reset_on_reconnect),
            send_backlog_limit: other.send_backlog_limit.or(self.send_backlog_limit),
        }
    }

    fn defaults() -> Config {
        Config {
            host: Some("127.0.0.1".to_string()),
            port: Some(24050),
            path: Some("/ws".to_string()),
            bindings_path: Some(PathBuf::from("presets/ingame.json")),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            reconnect_base_delay_ms: Some(1000),
            reconnect_max_delay_ms: Some(60000),
            heartbeat_threshold_seconds: Some(30),
            frame_interval_ms: Some(16),
            close_timeout_ms: Some(1000),
            farewell_message: Some("Client Closed!".to_string()),
            sink: Some(SinkKind::Console),
            output_dir: Some(PathBuf::from("./overlay_out")),
            reset_on_reconnect: Some(false),
            send_backlog_limit: Some(32),
            ..Default::default()
        }
    }

    /// Endpoint precedence: `url`, then the binding file's endpoint, then host/port/path.
    pub fn endpoint(&self, bindings_endpoint: Option<&str>) -> Result<Endpoint> {
        if let Some(url) = self.url.as_deref().or(bindings_endpoint) {
            return Endpoint::parse(url).with_context(|| format!("Invalid endpoint '{}'", url));
        }
        let host = self.host.as_deref().unwrap_or("127.0.0.1");
        let port = self.port.unwrap_or(24050);
        let path = self.path.as_deref().unwrap_or("/ws");
        Endpoint::from_parts(host, port, path).context("Invalid host/port/path")
    }

    pub fn transport_config(&self) -> TransportConfig {
        let defaults = TransportConfig::default();
        let farewell = match self.farewell_message.as_deref() {
            Some("") => None,
            Some(text) => Some(text.to_string()),
            None => defaults.farewell.clone(),
        };
        TransportConfig {
            base_delay: self.reconnect_base_delay_ms.map(Duration::from_millis).unwrap_or(defaults.base_delay),
            max_delay: self.reconnect_max_delay_ms.map(Duration::from_millis).unwrap_or(defaults.max_delay),
            heartbeat_threshold: match self.heartbeat_threshold_seconds {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.heartbeat_threshold,
            },
            farewell,
            close_timeout: self.close_timeout_ms.map(Duration::from_millis).unwrap_or(defaults.close_timeout),
            backlog_limit: self.send_backlog_limit.unwrap_or(defaults.backlog_limit),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.unwrap_or(16).max(1))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        if self.reset_on_reconnect.unwrap_or(false) {
            ReconnectPolicy::ResetOnReconnect
        } else {
            ReconnectPolicy::KeepLastSnapshot
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn bindings_path(&self) -> PathBuf {
        self.bindings_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("presets/ingame.json"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("./overlay_out"))
    }
}

/// A message produced while loading the config, logged once the logger is up.
pub type Notice = (log::Level, String);

/// Reads a JSON config file. `None` when it is missing or unusable.
fn read_config_file(path: &Path, notices: &mut Vec<Notice>) -> Option<Config> {
    if !path.exists() {
        notices.push((
            log::Level::Info,
            format!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display()),
        ));
        return None;
    }
    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<Config>(&raw) {
            Ok(config) => {
                notices.push((log::Level::Info, format!("Loaded config file {}", path.display())));
                Some(config)
            }
            Err(e) => {
                notices.push((
                    log::Level::Warn,
                    format!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e),
                ));
                None
            }
        },
        Err(e) => {
            notices.push((
                log::Level::Warn,
                format!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e),
            ));
            None
        }
    }
}

/// Default config location: the working directory first, then the user config dir.
fn default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("overlay_client").join(CONFIG_FILE_NAME))
        .unwrap_or(local)
}

/// Layers defaults, the config file, then environment variables and CLI arguments.
/// Logging is not set up yet at this point, so file problems come back as notices.
pub fn load_config_from(cli: Config) -> (Config, Vec<Notice>) {
    let mut notices = Vec::new();

    // 1. Defaults
    let mut current_config = Config::defaults();

    // 2. Config file, whose path may itself come from the CLI/env.
    let config_file_path = cli.config_path.clone().unwrap_or_else(default_config_path);
    if let Some(file_config) = read_config_file(&config_file_path, &mut notices) {
        current_config = current_config.merge(file_config);
    }

    // 3. Environment variables and CLI arguments (clap handles both).
    (current_config.merge(cli), notices)
}

pub fn load_config() -> (Config, Vec<Notice>) {
    load_config_from(Config::parse())
}
