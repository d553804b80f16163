use serde::Deserialize;


fn default_timeout_secs() -> u64 { 5 }
fn default_log_kind() -> String { "console".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_file() -> String { "staticd.log".to_string() }

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub doc_root: String,

    /// Idle keep-alive timeout between requests, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_kind")]
    pub kind: String,

    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_file")]
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?
            .try_deserialize()
    }
}
