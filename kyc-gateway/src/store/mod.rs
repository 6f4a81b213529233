//! Keyed in-memory store adapter (C3 half of the persistence layer, C8/C9
//! callers). A trait generalizes the teacher's `TokenBlacklist` shape
//! (real `redis::aio::ConnectionManager` implementation plus an in-memory
//! mock for tests) to the operations the rate limiter, quota cache,
//! usage-event queue, idempotency cache and suspension flag all need.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn health_check(&self) -> Result<(), anyhow::Error>;

    /// Atomically increments `key` and sets its TTL in one round-trip.
    /// Returns the post-increment value. This is the primitive behind
    /// the per-IP rate limiter (spec §4.5).
    async fn incr_with_expire(&self, key: &str, ttl_secs: u64) -> Result<i64, anyhow::Error>;

    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), anyhow::Error>;
    async fn set_nx(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, anyhow::Error>;
    async fn del(&self, key: &str) -> Result<(), anyhow::Error>;
    async fn exists(&self, key: &str) -> Result<bool, anyhow::Error>;

    /// Pushes a serialized event onto a list key, refreshing its TTL.
    async fn lpush_with_expire(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), anyhow::Error>;
    /// Pops up to `max` items from the tail of a list, waiting up to
    /// `wait_secs` for at least one to appear. Empty result on timeout.
    async fn brpop_batch(&self, key: &str, max: usize, wait_secs: u64) -> Result<Vec<String>, anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!("connecting to keyed store");
        let client = Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl KeyedStore for RedisStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("keyed store health check failed: {e}"))?;
        Ok(())
    }

    async fn incr_with_expire(&self, key: &str, ttl_secs: u64) -> Result<i64, anyhow::Error> {
        let mut conn = self.manager.clone();
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let set: bool = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .unwrap_or(false);
        Ok(set)
    }

    async fn del(&self, key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        Ok(conn.exists(key).await?)
    }

    async fn lpush_with_expire(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::pipe()
            .atomic()
            .lpush(key, value)
            .ignore()
            .expire(key, ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn brpop_batch(&self, key: &str, max: usize, wait_secs: u64) -> Result<Vec<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let mut out = Vec::with_capacity(max);

        let first: Option<(String, String)> = conn.brpop(key, wait_secs as f64).await?;
        let Some((_, first_val)) = first else {
            return Ok(out);
        };
        out.push(first_val);

        while out.len() < max {
            let next: Option<String> = conn.rpop(key, None).await?;
            match next {
                Some(v) => out.push(v),
                None => break,
            }
        }
        Ok(out)
    }
}

/// In-memory test double. Expiry is enforced lazily on access, matching
/// the teacher's `MockBlacklist`'s Mutex<HashSet> shape generalized to a
/// key/value store with list support.
#[derive(Default)]
pub struct MockStore {
    strings: Mutex<HashMap<String, (String, Option<Instant>)>>,
    lists: Mutex<HashMap<String, VecDeque<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &(String, Option<Instant>)) -> bool {
        match entry.1 {
            Some(deadline) => Instant::now() < deadline,
            None => true,
        }
    }
}

#[async_trait]
impl KeyedStore for MockStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn incr_with_expire(&self, key: &str, ttl_secs: u64) -> Result<i64, anyhow::Error> {
        let mut map = self.strings.lock().unwrap();
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        let entry = map.entry(key.to_string()).or_insert((String::from("0"), Some(deadline)));
        if !Self::is_live(entry) {
            *entry = (String::from("0"), Some(deadline));
        }
        let current: i64 = entry.0.parse().unwrap_or(0);
        let next = current + 1;
        entry.0 = next.to_string();
        entry.1 = Some(deadline);
        Ok(next)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let map = self.strings.lock().unwrap();
        Ok(map.get(key).filter(|e| Self::is_live(e)).map(|e| e.0.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), anyhow::Error> {
        let mut map = self.strings.lock().unwrap();
        map.insert(
            key.to_string(),
            (value.to_string(), Some(Instant::now() + Duration::from_secs(ttl_secs))),
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, anyhow::Error> {
        let mut map = self.strings.lock().unwrap();
        let live = map.get(key).map(Self::is_live).unwrap_or(false);
        if live {
            return Ok(false);
        }
        map.insert(
            key.to_string(),
            (value.to_string(), Some(Instant::now() + Duration::from_secs(ttl_secs))),
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<(), anyhow::Error> {
        self.strings.lock().unwrap().remove(key);
        self.lists.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, anyhow::Error> {
        let map = self.strings.lock().unwrap();
        Ok(map.get(key).map(Self::is_live).unwrap_or(false))
    }

    async fn lpush_with_expire(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<(), anyhow::Error> {
        let mut lists = self.lists.lock().unwrap();
        lists.entry(key.to_string()).or_default().push_front(value.to_string());
        Ok(())
    }

    async fn brpop_batch(&self, key: &str, max: usize, _wait_secs: u64) -> Result<Vec<String>, anyhow::Error> {
        let mut lists = self.lists.lock().unwrap();
        let Some(list) = lists.get_mut(key) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(max);
        while out.len() < max {
            match list.pop_back() {
                Some(v) => out.push(v),
                None => break,
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_with_expire_counts_up() {
        let store = MockStore::new();
        assert_eq!(store.incr_with_expire("k", 60).await.unwrap(), 1);
        assert_eq!(store.incr_with_expire("k", 60).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn set_nx_only_succeeds_once() {
        let store = MockStore::new();
        assert!(store.set_nx("flag", "1", 60).await.unwrap());
        assert!(!store.set_nx("flag", "1", 60).await.unwrap());
    }

    #[tokio::test]
    async fn list_push_pop_preserves_fifo_order() {
        let store = MockStore::new();
        store.lpush_with_expire("q", "a", 60).await.unwrap();
        store.lpush_with_expire("q", "b", 60).await.unwrap();
        store.lpush_with_expire("q", "c", 60).await.unwrap();
        let batch = store.brpop_batch("q", 10, 1).await.unwrap();
        assert_eq!(batch, vec!["a", "b", "c"]);
    }
}
