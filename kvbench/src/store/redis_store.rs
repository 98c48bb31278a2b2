use super::{Connector, Store, StoreError};
use kvbench_core::BenchConfig;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError};
use tracing::debug;
use url::Url;

/// Opens connections to a Redis-compatible server.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl Connector for RedisConnector {
    type Connection = RedisStore;

    async fn connect(&self, config: &BenchConfig) -> Result<RedisStore, StoreError> {
        let connect_err = |reason: String| StoreError::Connect {
            addr: config.address(),
            reason,
        };

        let url = connection_url(config).map_err(connect_err)?;
        debug!("Opening Redis connection to {}", config.address());

        let client = redis::Client::open(url.as_str()).map_err(|e| connect_err(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        Ok(RedisStore { conn })
    }
}

impl Store for RedisStore {
    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let _: () = self.conn.set(key, value).await?;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn.get(key).await?)
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let _: () = self.conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn.hget(key, field).await?)
    }

    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.conn.keys(pattern).await?)
    }

    async fn del(&mut self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        Ok(self.conn.del(keys).await?)
    }

    async fn close(mut self) -> Result<(), StoreError> {
        redis::cmd("QUIT")
            .query_async::<_, ()>(&mut self.conn)
            .await?;
        Ok(())
    }
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            StoreError::Disconnected(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

fn connection_url(config: &BenchConfig) -> Result<Url, String> {
    let mut url = Url::parse(&format!(
        "redis://{}:{}/{}",
        config.host(),
        config.port(),
        config.database()
    ))
    .map_err(|e| e.to_string())?;

    if let Some(password) = config.password() {
        url.set_password(Some(password))
            .map_err(|_| "password cannot be set on this address".to_string())?;
    }

    Ok(url)
}
