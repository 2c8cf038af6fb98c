#![cfg(not(tarpaulin_include))]

use std::env;
use std::path::PathBuf;

/// Runtime configuration, read from the environment (a `.env` file is
/// honored when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory holding the snapshot and the mirrored workbook.
    pub data_dir: PathBuf,
    pub admin_username: String,
    pub admin_password: String,
    pub admin_email: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Build the configuration from environment variables, falling back to
    /// development defaults. The default admin credentials match the ones
    /// shown on the login page; override them outside of demos.
    pub fn from_env() -> Self {
        Config {
            host: env_or("HOST", "127.0.0.1"),
            port: env_or("PORT", "3000").parse().unwrap_or(3000),
            data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
            admin_username: env_or("ADMIN_USERNAME", "admin"),
            admin_password: env_or("ADMIN_PASSWORD", "admin123"),
            admin_email: env_or("ADMIN_EMAIL", "admin@example.com"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.data_dir.join("responses.bin.gz")
    }

    pub fn workbook_file(&self) -> PathBuf {
        self.data_dir.join("responses.xlsx")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
