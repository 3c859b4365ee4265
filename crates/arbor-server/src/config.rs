//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// SQLite database file holding the tree records.
    /// Env: `DATABASE_PATH`
    /// Default: `./instance/arbor.db`
    pub database_path: PathBuf,

    /// Root directory for uploaded images; each tree gets a subdirectory.
    /// Env: `UPLOAD_ROOT`
    /// Default: `./uploads`
    pub upload_root: PathBuf,

    /// Maximum upload size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 16 MiB
    pub max_upload_size: usize,

    /// Remove a tree's upload directory when the tree is deleted.
    /// Env: `PURGE_UPLOADS_ON_DELETE` (true/false)
    /// Default: `false` (uploads are left behind)
    pub purge_uploads_on_delete: bool,

    /// Check that an upload's leading bytes match its extension.
    /// Env: `VERIFY_IMAGE_CONTENT` (true/false)
    /// Default: `false` (extension check only)
    pub verify_image_content: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 5000).into(),
            database_path: PathBuf::from("./instance/arbor.db"),
            upload_root: PathBuf::from("./uploads"),
            max_upload_size: 16 * 1024 * 1024, // 16 MiB
            purge_uploads_on_delete: false,
            verify_image_content: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("UPLOAD_ROOT") {
            config.upload_root = PathBuf::from(path);
        }

        if let Some(val) = lookup("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid MAX_UPLOAD_SIZE, using default"
                ),
            }
        }

        if let Some(val) = lookup("PURGE_UPLOADS_ON_DELETE") {
            match parse_flag(&val) {
                Some(flag) => config.purge_uploads_on_delete = flag,
                None => tracing::warn!(
                    value = %val,
                    "Invalid PURGE_UPLOADS_ON_DELETE, using default"
                ),
            }
        }

        if let Some(val) = lookup("VERIFY_IMAGE_CONTENT") {
            match parse_flag(&val) {
                Some(flag) => config.verify_image_content = flag,
                None => tracing::warn!(
                    value = %val,
                    "Invalid VERIFY_IMAGE_CONTENT, using default"
                ),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
