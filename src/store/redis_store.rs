//! Store fronting a Redis server.
//!
//! Values are written as plain decimal integers with `SET` and parsed back on
//! `GET`; a nil reply is reported as `0`. `release` issues `FLUSHDB`, which
//! wipes the whole selected logical database.

use parking_lot::Mutex;
use redis::Commands;

use super::{Result, UidStore};
use crate::config::RedisConfig;

/// A [`UidStore`] on one Redis connection.
pub struct RedisStore {
    conn: Mutex<redis::Connection>,
    addr: String,
    db: i64,
}

impl RedisStore {
    /// Connect to the server and database named in `config`.
    pub fn open(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url())?;
        let conn = client.get_connection()?;
        tracing::info!(addr = %config.addr, db = config.db, "connected to redis uid store");
        Ok(Self {
            conn: Mutex::new(conn),
            addr: config.addr.clone(),
            db: config.db,
        })
    }
}

impl UidStore for RedisStore {
    fn get(&self, key: &str) -> Result<u64> {
        let value: Option<u64> = self.conn.lock().get(key)?;
        Ok(value.unwrap_or(0))
    }

    fn put(&self, key: &str, value: u64) -> Result<()> {
        let _: () = self.conn.lock().set(key, value)?;
        Ok(())
    }

    fn release(&self) -> Result<()> {
        redis::cmd("FLUSHDB").query::<()>(&mut *self.conn.lock())?;
        tracing::info!(addr = %self.addr, db = self.db, "flushed redis uid store");
        Ok(())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("addr", &self.addr)
            .field("db", &self.db)
            .finish()
    }
}
