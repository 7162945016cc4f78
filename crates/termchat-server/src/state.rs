//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances shared by every telnet
//! session and the HTTP handlers. Services are generic over the core storage
//! traits; AppState pins them to the SQLite implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use termchat_core::chat::service::ChatService;
use termchat_core::relay::RelayBus;
use termchat_infra::config::resolve_encryption_key;
use termchat_infra::crypto::cipher::MessageCipher;
use termchat_infra::crypto::password::PasswordHasher;
use termchat_infra::sqlite::message::SqliteMessageStore;
use termchat_infra::sqlite::pool::{DatabasePool, default_database_url};
use termchat_infra::sqlite::user::SqliteUserDirectory;
use termchat_types::config::ServerConfig;

/// Concrete type alias for the chat service pinned to infra implementations.
pub type ConcreteChatService = ChatService<SqliteMessageStore>;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ConcreteChatService>,
    pub users: Arc<SqliteUserDirectory>,
    pub config: Arc<ServerConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Resolve the message key from the environment or config, then [`open`].
    ///
    /// A missing key fails here, before anything listens.
    ///
    /// [`open`]: AppState::open
    pub async fn init(config: ServerConfig, data_dir: &Path) -> anyhow::Result<Self> {
        let key = resolve_encryption_key(&config)?;
        Self::open(config, &key, data_dir).await
    }

    /// Validate `key`, open the database, wire services. A malformed key
    /// fails before the data directory is touched.
    pub async fn open(
        config: ServerConfig,
        key: &SecretString,
        data_dir: &Path,
    ) -> anyhow::Result<Self> {
        let cipher = MessageCipher::from_base64(key.expose_secret())
            .context("invalid message encryption key")?;

        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let db_url = config
            .database_url
            .clone()
            .unwrap_or_else(|| default_database_url(data_dir));
        let pool = DatabasePool::new(&db_url)
            .await
            .context("opening database")?;

        Ok(Self::from_parts(pool, cipher, PasswordHasher::new(), config))
    }

    pub fn from_parts(
        pool: DatabasePool,
        cipher: MessageCipher,
        hasher: PasswordHasher,
        config: ServerConfig,
    ) -> Self {
        let bus = RelayBus::new(config.relay_capacity);
        let store = SqliteMessageStore::new(pool.clone(), cipher);
        Self {
            chat: Arc::new(ChatService::new(store, bus)),
            users: Arc::new(SqliteUserDirectory::with_hasher(pool, hasher)),
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }
}
