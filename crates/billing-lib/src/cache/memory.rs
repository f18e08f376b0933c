//! In-memory cost cache

use super::{CachedCostEntry, CostCacheStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

struct Slot {
    entry: CachedCostEntry,
    expires_at: Instant,
}

/// `DashMap`-backed cache; expiry is checked lazily on read
#[derive(Default)]
pub struct InMemoryCostCache {
    entries: DashMap<String, Slot>,
}

impl InMemoryCostCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CostCacheStore for InMemoryCostCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CachedCostEntry>> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return Ok(None),
            Some(slot) if slot.expires_at > now => return Ok(Some(slot.entry.clone())),
            Some(_) => {}
        }
        // the read guard is released before touching the shard again
        self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        Ok(None)
    }

    async fn put(&self, key: &str, entry: CachedCostEntry, ttl: Duration) -> anyhow::Result<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| anyhow::anyhow!("ttl {ttl:?} is out of range"))?;
        self.entries
            .insert(key.to_string(), Slot { entry, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, slot| {
            let keep = slot.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceMetricsSnapshot;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn entry(workload: &str) -> CachedCostEntry {
        CachedCostEntry {
            workload_id: workload.to_string(),
            tenant_id: "acme".to_string(),
            costs: BTreeMap::new(),
            metrics_used: ResourceMetricsSnapshot::default(),
            captured_at: Utc::now(),
            expires_at: None,
            degradations: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_lazily() {
        let cache = InMemoryCostCache::new();
        cache.put("k", entry("a"), Duration::from_secs(120)).await.unwrap();

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 1);
        assert!(cache.get("k").await.unwrap().is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_writer_wins() {
        let cache = InMemoryCostCache::new();
        cache.put("k", entry("first"), Duration::from_secs(10)).await.unwrap();
        cache.put("k", entry("second"), Duration::from_secs(10)).await.unwrap();

        let got = cache.get("k").await.unwrap().unwrap();
        assert_eq!(got.workload_id, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_remove() {
        let cache = InMemoryCostCache::new();
        cache.put("short", entry("a"), Duration::from_secs(1)).await.unwrap();
        cache.put("long", entry("b"), Duration::from_secs(100)).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 1);
        assert!(cache.remove("long").await.unwrap());
        assert!(!cache.remove("long").await.unwrap());
        assert!(cache.is_empty());
    }
}
