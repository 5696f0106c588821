use std::time::Duration;

use moka::future::Cache;

use super::identity::IdentityKind;

/// Recently confirmed "taken" identities. Only positives are stored.
pub struct TakenCache {
    inner: Cache<(IdentityKind, String), ()>,
}

impl TakenCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn mark_taken(&self, kind: IdentityKind, normalized: &str) {
        self.inner.insert((kind, normalized.to_string()), ()).await;
    }

    pub async fn is_taken(&self, kind: IdentityKind, normalized: &str) -> bool {
        self.inner
            .get(&(kind, normalized.to_string()))
            .await
            .is_some()
    }

    pub async fn forget(&self, kind: IdentityKind, normalized: &str) {
        self.inner.invalidate(&(kind, normalized.to_string())).await;
    }

    pub async fn mark_batch(&self, kind: IdentityKind, values: &[String]) {
        let inserts = values
            .iter()
            .map(|v| self.inner.insert((kind, v.clone()), ()));
        futures::future::join_all(inserts).await;
    }
}

impl Default for TakenCache {
    fn default() -> Self {
        // 24h TTL
        Self::new(500_000, Duration::from_secs(86_400))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn taken_until_forgotten() {
        let cache = TakenCache::default();
        cache.mark_taken(IdentityKind::Username, "budi").await;

        assert!(cache.is_taken(IdentityKind::Username, "budi").await);
        assert!(!cache.is_taken(IdentityKind::Email, "budi").await);

        cache.forget(IdentityKind::Username, "budi").await;
        assert!(!cache.is_taken(IdentityKind::Username, "budi").await);
    }
}
