use chrono::Utc;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::{
    error::{CacheError, Error},
    jwt::SessionData,
    schema::Id,
};

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }
}

impl<T: ToString + Serialize> std::fmt::Display for CacheKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self._type {
            CacheKeyType::RevokedToken => write!(f, "revoked-{}", self._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum CacheKeyType {
    RevokedToken,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

// Cache - values

/// Marker stored for a logged out token until the token would have expired.
#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone, Debug, PartialEq)]
pub struct RevokedSession {
    pub user_id: Id,
    pub expires_at: i64,
}

/// Seconds until `expires_at`, at least one so the key always expires.
pub fn remaining_lifetime(expires_at: i64, now: i64) -> u64 {
    (expires_at - now).max(1) as u64
}

/// Revoked token ids, kept in redis. The connection is opened on first use.
pub struct SessionStore {
    client: Client,
    connection: OnceCell<MultiplexedConnection>,
}

impl SessionStore {
    pub fn open(url: &str) -> Result<Self, Error> {
        let client = Client::open(url).map_err(CacheError::from)?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, Error> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                log::info!("Connecting to redis...");
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(CacheError::from)
            })
            .await?;

        Ok(connection.clone())
    }

    pub async fn revoke(&self, session: &SessionData) -> Result<(), Error> {
        let key = CacheKeyType::RevokedToken.new(&session.token_id);
        let value = RevokedSession {
            user_id: session.user_id,
            expires_at: session.expires_at,
        };
        let ttl = remaining_lifetime(session.expires_at, Utc::now().timestamp());

        let mut cache = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key.to_string())
            .arg(value)
            .arg("EX")
            .arg(ttl)
            .query_async(&mut cache)
            .await
            .map_err(CacheError::from)?;

        log::trace!("> Revoked {key} for {ttl}s");
        Ok(())
    }

    pub async fn is_revoked(&self, token_id: &str) -> Result<bool, Error> {
        let key = CacheKeyType::RevokedToken.new(token_id);

        let mut cache = self.connection().await?;
        let value: Option<RevokedSession> = cache
            .get(key.to_string())
            .await
            .map_err(CacheError::from)?;

        Ok(value.is_some())
    }
}
