use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

/// Key/value storage scoped to one browser tab. Batches are applied as a whole.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_all(&self, entries: &[(&str, String)]) -> Result<()>;

    async fn remove_all(&self, keys: &[&str]) -> Result<()>;
}

#[derive(Default)]
pub struct MemorySessionStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_all(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut map = self.entries.write().await;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut map = self.entries.write().await;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// Redis-backed storage. Each tab gets its own key namespace and keys expire
/// with the booking session TTL.
pub struct RedisSessionStorage {
    pool: Pool,
    namespace: String,
    ttl_secs: u64,
}

impl RedisSessionStorage {
    pub async fn new(config: &AppConfig, tab_id: Uuid) -> Result<Self> {
        let redis_url = config
            .redis_url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| anyhow!("Failed to create Redis pool: {}", e))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| anyhow!("Failed to connect to Redis: {}", e))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Redis session storage initialized for tab {}", tab_id);
        Ok(Self::with_pool(pool, tab_id, config.booking_session_ttl_minutes))
    }

    pub fn with_pool(pool: Pool, tab_id: Uuid, ttl_minutes: i64) -> Self {
        let ttl_secs = u64::try_from(ttl_minutes.max(1) * 60).unwrap_or(1800);
        Self {
            pool,
            namespace: format!("booking_session:{}", tab_id),
            ttl_secs,
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| anyhow!("Failed to get Redis connection: {}", e))
    }
}

#[async_trait]
impl SessionStorage for RedisSessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_all(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut conn = self.connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.cmd("SET")
                .arg(self.key(key))
                .arg(value)
                .arg("EX")
                .arg(self.ttl_secs)
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;

        debug!("Stored {} session keys under {}", entries.len(), self.namespace);
        Ok(())
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut conn = self.connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.cmd("DEL").arg(self.key(key)).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;

        debug!("Removed {} session keys under {}", keys.len(), self.namespace);
        Ok(())
    }
}
