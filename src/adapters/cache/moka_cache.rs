use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use std::hash::Hash;
use std::time::Duration;
use crate::ports::Cache;

/// TTL-bounded in-memory cache backing the `Cache` port.
pub struct MokaCacheAdapter<K, V> {
    inner: MokaCache<K, V>,
}

impl<K, V> MokaCacheAdapter<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let cache = MokaCache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        Self { inner: cache }
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MokaCacheAdapter<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    async fn remove(&self, key: &K) {
        self.inner.remove(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Project, ProjectId, ProjectStatus};

    fn project(id: &str) -> Project {
        Project {
            id: id.into(),
            name: format!("Project {id}"),
            status: ProjectStatus::Planning,
            location: None,
            budget: Some(250_000.0),
            team_member_ids: vec![],
        }
    }

    #[tokio::test]
    async fn caches_projects_by_id() {
        let cache = MokaCacheAdapter::<ProjectId, Project>::new(60, 100);
        let key = ProjectId::from("p1");

        cache.insert(key.clone(), project("p1")).await;
        assert_eq!(cache.get(&key).await, Some(project("p1")));

        cache.remove(&key).await;
        assert_eq!(cache.get(&key).await, None);
    }
}
