use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

pub use storage_resp::RespConfig;

#[derive(Parser)]
#[command(name = "relay-server", about = "Topic-based message relay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "RELAY_CONFIG")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Максимальный размер тела запроса, байт.
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    /// Prepended to every store key.
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    Resp(RespConfig),
}

fn default_api_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    relay_api_server::DEFAULT_BODY_LIMIT
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, crate::error::ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|detail| crate::error::ServerError::Config { context: "parse", detail: format!("'{path}': {detail}") })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}
