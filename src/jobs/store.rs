//! Job record backends: Redis with TTL, or a process-local map.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::IngestionJob;
use crate::config::JobStoreConfig;
use crate::error::JobStoreResult;

/// Key prefix for job records.
pub const JOB_KEY_PREFIX: &str = "ingest_job";
/// Sorted set of job ids scored by last update time.
pub const JOB_INDEX_KEY: &str = "ingest_job:index";

pub fn job_key(job_id: &str) -> String {
    format!("{}:{}", JOB_KEY_PREFIX, job_id)
}

/// Persistence for job records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or overwrite a record and bump it in the recency index.
    async fn save(&self, job: &IngestionJob) -> JobStoreResult<()>;

    async fn load(&self, job_id: &str) -> JobStoreResult<Option<IngestionJob>>;

    /// Job ids, most recently updated first.
    async fn recent_ids(&self, limit: usize) -> JobStoreResult<Vec<String>>;

    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct MemoryInner {
    jobs: HashMap<String, IngestionJob>,
    /// Oldest first.
    index: VecDeque<String>,
}

/// Process-local job store.
///
/// Records are lost on restart. The index is capped; evicted ids drop their
/// records too.
#[derive(Debug)]
pub struct MemoryJobStore {
    inner: RwLock<MemoryInner>,
    index_cap: usize,
}

impl MemoryJobStore {
    pub fn new(index_cap: usize) -> Self {
        Self {
            inner: RwLock::new(MemoryInner::default()),
            index_cap: index_cap.max(1),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(JobStoreConfig::DEFAULT_INDEX_CAP)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save(&self, job: &IngestionJob) -> JobStoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.index.retain(|id| id != &job.job_id);
        inner.index.push_back(job.job_id.clone());
        inner.jobs.insert(job.job_id.clone(), job.clone());

        while inner.index.len() > self.index_cap {
            if let Some(evicted) = inner.index.pop_front() {
                inner.jobs.remove(&evicted);
            }
        }
        Ok(())
    }

    async fn load(&self, job_id: &str) -> JobStoreResult<Option<IngestionJob>> {
        Ok(self.inner.read().await.jobs.get(job_id).cloned())
    }

    async fn recent_ids(&self, limit: usize) -> JobStoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner.index.iter().rev().take(limit).cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Redis-backed job store.
///
/// Each record is a JSON string under `ingest_job:{id}` with a TTL; the
/// index sorted set is trimmed to the newest `index_cap` members on write.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: MultiplexedConnection,
    ttl_secs: u64,
    index_cap: usize,
}

impl RedisJobStore {
    /// Connect and verify the server answers PING
    pub async fn connect(url: &str, ttl_secs: u64, index_cap: usize) -> JobStoreResult<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(response = %pong, "Redis job store reachable");

        info!(ttl_secs, index_cap, "Using Redis job store");
        Ok(Self {
            conn,
            ttl_secs,
            index_cap: index_cap.max(1),
        })
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn save(&self, job: &IngestionJob) -> JobStoreResult<()> {
        let payload = serde_json::to_string(job)?;
        let score = job.updated_at.timestamp_millis() as f64;
        // keep ranks [-cap, -1], i.e. the newest `cap` members
        let trim_stop = -(self.index_cap as isize) - 1;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .set_ex(job_key(&job.job_id), payload, self.ttl_secs)
            .ignore()
            .zadd(JOB_INDEX_KEY, &job.job_id, score)
            .ignore()
            .zremrangebyrank(JOB_INDEX_KEY, 0, trim_stop)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn load(&self, job_id: &str) -> JobStoreResult<Option<IngestionJob>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(job_key(job_id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn recent_ids(&self, limit: usize) -> JobStoreResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(limit).map_or(-1, |l| l - 1);
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrevrange(JOB_INDEX_KEY, 0, stop).await?;
        Ok(ids)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn job(id: &str) -> IngestionJob {
        IngestionJob::new(id, "test", None, Map::new())
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryJobStore::new(10);
        store.save(&job("a")).await.unwrap();

        let loaded = store.load("a").await.unwrap();
        assert_eq!(loaded.map(|j| j.job_id), Some("a".to_string()));
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_orders_by_last_save() {
        let store = MemoryJobStore::new(10);
        for id in ["a", "b", "c"] {
            store.save(&job(id)).await.unwrap();
        }
        store.save(&job("a")).await.unwrap();

        assert_eq!(store.recent_ids(10).await.unwrap(), vec!["a", "c", "b"]);
        assert_eq!(store.recent_ids(1).await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_memory_store_index_cap_evicts_oldest() {
        let store = MemoryJobStore::new(2);
        for id in ["a", "b", "c"] {
            store.save(&job(id)).await.unwrap();
        }
        assert_eq!(store.recent_ids(10).await.unwrap(), vec!["c", "b"]);
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[test]
    fn test_job_key() {
        assert_eq!(job_key("123"), "ingest_job:123");
    }
}
