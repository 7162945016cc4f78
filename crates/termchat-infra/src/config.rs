//! Server configuration loader for TermChat.
//!
//! Reads `termchat_{env}.toml` from the data directory (`~/.termchat/` unless
//! `TERMCHAT_DATA_DIR` is set) and deserializes it into [`ServerConfig`].
//! Falls back to defaults when the file is missing or malformed. The message
//! key may be overridden from the environment so it never has to live in a
//! file.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use termchat_types::config::ServerConfig;
use thiserror::Error;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "TERMCHAT_DATA_DIR";

/// Environment variable holding the base64 message key.
pub const ENCRYPTION_KEY_ENV: &str = "TERMCHAT_ENCRYPTION_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no message encryption key configured (set {ENCRYPTION_KEY_ENV} or encryption_key)")]
    MissingEncryptionKey,
}

/// Resolve the data directory: `$TERMCHAT_DATA_DIR`, else `~/.termchat`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".termchat")
}

/// Config file for a deployment environment: `{data_dir}/termchat_{env}.toml`.
pub fn config_path(data_dir: &Path, env: &str) -> PathBuf {
    data_dir.join(format!("termchat_{env}.toml"))
}

/// Load server configuration from `path`.
///
/// - If the file does not exist, returns [`ServerConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_server_config(path: &Path) -> ServerConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return ServerConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ServerConfig::default();
        }
    };

    match toml::from_str::<ServerConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ServerConfig::default()
        }
    }
}

/// The message key: environment first, then the config file.
pub fn resolve_encryption_key(config: &ServerConfig) -> Result<SecretString, ConfigError> {
    let from_env = std::env::var(ENCRYPTION_KEY_ENV).ok();
    pick_encryption_key(from_env, config.encryption_key.clone())
}

fn pick_encryption_key(
    from_env: Option<String>,
    from_file: Option<String>,
) -> Result<SecretString, ConfigError> {
    from_env
        .into_iter()
        .chain(from_file)
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .map(SecretString::from)
        .ok_or(ConfigError::MissingEncryptionKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_server_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_server_config(&config_path(tmp.path(), "dev")).await;
        assert_eq!(config.tcp_addr, "0.0.0.0:9000");
        assert!(config.encryption_key.is_none());
    }

    #[tokio::test]
    async fn load_server_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(tmp.path(), "prod");
        tokio::fs::write(
            &path,
            r#"
tcp_addr = "127.0.0.1:2323"
http_addr = "127.0.0.1:8081"
encryption_key = "a2V5"
history_preview = 10
"#,
        )
        .await
        .unwrap();

        let config = load_server_config(&path).await;
        assert_eq!(config.tcp_addr, "127.0.0.1:2323");
        assert_eq!(config.http_addr, "127.0.0.1:8081");
        assert_eq!(config.history_preview, 10);
        assert_eq!(config.encryption_key.as_deref(), Some("a2V5"));
    }

    #[tokio::test]
    async fn load_server_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = config_path(tmp.path(), "dev");
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_server_config(&path).await;
        assert_eq!(config.history_preview, 5);
    }

    #[test]
    fn config_path_includes_environment() {
        let path = config_path(Path::new("/data"), "staging");
        assert_eq!(path, PathBuf::from("/data/termchat_staging.toml"));
    }

    #[test]
    fn environment_key_wins_over_file() {
        let key = pick_encryption_key(Some("env".to_string()), Some("file".to_string())).unwrap();
        assert_eq!(key.expose_secret(), "env");

        let key = pick_encryption_key(Some("  ".to_string()), Some("file".to_string())).unwrap();
        assert_eq!(key.expose_secret(), "file");
    }

    #[test]
    fn missing_key_is_an_error() {
        assert!(matches!(
            pick_encryption_key(None, None),
            Err(ConfigError::MissingEncryptionKey)
        ));
    }
}
