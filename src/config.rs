use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Unprefixed variable names accepted alongside `RADIO__*`.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("STREAM_URL", "stream.url"),
    ("RECORDINGS_DIR", "recording.dir"),
    ("ENVIRONMENT", "service.environment"),
    ("PORT", "service.http.port"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub stream: StreamConfig,
    pub recording: RecordingConfig,
    pub cors: CorsConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub environment: Environment,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "radio-recorder".to_string(),
            environment: Environment::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Deployment environment; decides the identity cookie attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[serde(alias = "dev")]
    Development,
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Upstream live stream, proxied on /stream and recorded on demand
    pub url: String,
    pub connect_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "http://stream.live.vc.bbcmedia.co.uk/bbc_world_service".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl StreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub bitrate_kbps: u32,
    pub channels: u16,
    pub sample_rate: u32,
    /// Recordings shorter than this are padded before the stop signal
    pub min_duration_ms: u64,
    /// Upper bound on the wait for the transcoder to exit after SIGTERM
    pub stop_grace_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("recordings"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            bitrate_kbps: 128,
            channels: 2,
            sample_rate: 44_100,
            min_duration_ms: 1000,
            stop_grace_ms: 1000,
        }
    }
}

impl RecordingConfig {
    pub fn min_duration(&self) -> Duration {
        Duration::from_millis(self.min_duration_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions untouched for this long are evicted (0 disables eviction)
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 10 * 60,
        }
    }
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Config {
    /// Load defaults, then the optional file at `path`, then `RADIO__*`
    /// variables, then the legacy variable names from the process environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(path: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RADIO")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins"),
        );

        for (var, key) in LEGACY_ENV {
            builder = builder
                .set_override_option(*key, lookup(var))
                .with_context(|| format!("Invalid value in {}", var))?;
        }

        let origins = lookup("ALLOWED_ORIGINS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        builder = builder
            .set_override_option("cors.allowed_origins", origins)
            .context("Invalid value in ALLOWED_ORIGINS")?;

        let settings = builder.build().context("Failed to build configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
