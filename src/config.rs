use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub mode: RunMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: RunMode::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

/// HTTP run mode. Unknown values fail deserialization, which aborts startup.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Release,
    Debug,
    Test,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Release => "release",
            RunMode::Debug => "debug",
            RunMode::Test => "test",
        }
    }

    /// Default tracing filter when RUST_LOG is not set.
    pub fn default_filter(&self) -> &'static str {
        match self {
            RunMode::Release => "intake=info,tower_http=info",
            RunMode::Debug => "intake=debug,tower_http=debug",
            RunMode::Test => "intake=warn",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub dbname: String,
    #[serde(default)]
    pub sslmode: SslMode,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_db_host() -> String {
    "localhost".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_max_connections() -> u32 {
    10
}
fn default_acquire_timeout() -> u64 {
    5
}

/// libpq-style `sslmode` values.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
    #[serde(default = "default_user_agent_header")]
    pub user_agent_header: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_payload_bytes: default_max_payload_bytes(),
            user_id_header: default_user_id_header(),
            user_agent_header: default_user_agent_header(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}
fn default_max_payload_bytes() -> usize {
    65536
}
fn default_user_id_header() -> String {
    "X-Tantum-Authorization".to_string()
}
fn default_user_agent_header() -> String {
    "X-Tantum-UserAgent".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_in_flight_writes")]
    pub max_in_flight_writes: usize,
    /// Artificial per-item delay before transformation. Zero disables it.
    #[serde(default)]
    pub processing_delay_ms: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_in_flight_writes: default_max_in_flight_writes(),
            processing_delay_ms: 0,
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_workers() -> usize {
    10
}
fn default_max_in_flight_writes() -> usize {
    32
}
fn default_shutdown_timeout() -> u64 {
    10
}

impl AppConfig {
    /// Reject settings that would leave the pipeline unable to make progress.
    pub fn validate(&self) -> Result<(), String> {
        if self.ingest.queue_capacity == 0 {
            return Err("ingest.queue_capacity must be greater than zero".to_string());
        }
        if self.pipeline.workers == 0 {
            return Err("pipeline.workers must be greater than zero".to_string());
        }
        if self.pipeline.max_in_flight_writes == 0 {
            return Err("pipeline.max_in_flight_writes must be greater than zero".to_string());
        }
        if self.ingest.user_id_header.trim().is_empty()
            || self.ingest.user_agent_header.trim().is_empty()
        {
            return Err("ingest header names must not be empty".to_string());
        }
        if axum::http::HeaderName::from_bytes(self.ingest.user_id_header.as_bytes()).is_err()
            || axum::http::HeaderName::from_bytes(self.ingest.user_agent_header.as_bytes())
                .is_err()
        {
            return Err("ingest header names must be valid HTTP header names".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("database.max_connections must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // Overlay with environment variables (INTAKE__SERVER__PORT=8081, etc.)
        builder = builder.add_source(
            Environment::with_prefix("INTAKE")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
