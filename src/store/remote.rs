//! Redis backed list store: `RPUSH` through a pipeline, flushed on demand.

use redis::Commands;
use url::Url;

use super::{ListStore, StoreConnection};
use crate::error::StoreError;

const DEFAULT_REDIS_HOST: &str = "127.0.0.1";

/// Redis server reachable over TCP, optionally protected by a password.
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Creates a client for `address` (`host:port`, `:port` meaning the local host). No connection is made yet.
    pub fn open(address: &str, password: Option<&str>) -> Result<Self, StoreError> {
        let url = connection_url(address, password)?;
        let client = redis::Client::open(url.as_str())?;
        Ok(Self { client })
    }

    /// Checks that the server is reachable and accepts the credentials.
    pub fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.client.get_connection()?;
        redis::cmd("PING").query::<String>(&mut conn)?;
        Ok(())
    }
}

fn connection_url(address: &str, password: Option<&str>) -> Result<Url, StoreError> {
    let invalid = |message: &str| StoreError::Address {
        address: address.to_string(),
        message: message.to_string(),
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    let host = if host.is_empty() { DEFAULT_REDIS_HOST } else { host };
    let port: u16 = port.parse().map_err(|_| invalid("invalid port"))?;

    let mut url = Url::parse(&format!("redis://{host}:{port}/"))
        .map_err(|e| invalid(&e.to_string()))?;
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|()| invalid("cannot carry a password"))?;
    }
    Ok(url)
}

impl ListStore for RedisStore {
    type Connection = RedisConnection;

    fn connect(&self) -> Result<RedisConnection, StoreError> {
        Ok(RedisConnection {
            conn: self.client.get_connection()?,
            pipeline: redis::pipe(),
        })
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_connection()?;
        let _: () = conn.del(key)?;
        Ok(())
    }

    fn len(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.client.get_connection()?;
        Ok(conn.llen(key)?)
    }
}

pub struct RedisConnection {
    conn: redis::Connection,
    pipeline: redis::Pipeline,
}

impl StoreConnection for RedisConnection {
    fn queue_push(&mut self, key: &str, document: String) -> Result<(), StoreError> {
        self.pipeline.rpush(key, document).ignore();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let result = self.pipeline.query::<()>(&mut self.conn);
        self.pipeline.clear();
        Ok(result?)
    }
}
