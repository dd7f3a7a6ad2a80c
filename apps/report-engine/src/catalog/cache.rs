//! Explicit TTL cache in front of any catalog.
//!
//! Entries expire `ttl` after they were loaded; `invalidate(section)` and
//! `clear()` drop them early. The clock is injectable so expiry is testable.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::catalog::{Catalog, PolicyStore};
use crate::errors::EngineError;
use crate::models::{AssemblerDefaults, Candidate, CardRules, HighlightTemplates, SelectionPolicy};

/// Key under which pack-wide documents are cached.
const PACK_KEY: &str = "*";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct Entry<V> {
    loaded_at: DateTime<Utc>,
    value: V,
}

/// One document kind, keyed by section.
struct TtlMap<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlMap<V> {
    fn new() -> Self {
        TtlMap {
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        now: DateTime<Utc>,
        ttl: Duration,
        load: F,
    ) -> Result<V, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, EngineError>>,
    {
        if let Some(entry) = self.entries.read().await.get(key) {
            if now - entry.loaded_at < ttl {
                return Ok(entry.value.clone());
            }
        }

        debug!("Catalog cache miss for '{key}'");
        let value = load().await?;
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                loaded_at: now,
                value: value.clone(),
            },
        );
        Ok(value)
    }

    async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

/// Caching decorator; errors are never cached.
pub struct CachedCatalog<C> {
    inner: C,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    candidates: TtlMap<Vec<Candidate>>,
    fallback: TtlMap<Vec<Candidate>>,
    rules: TtlMap<CardRules>,
    templates: TtlMap<Option<HighlightTemplates>>,
    policies: TtlMap<Option<SelectionPolicy>>,
    defaults: TtlMap<AssemblerDefaults>,
}

impl<C> CachedCatalog<C> {
    pub fn new(inner: C, ttl: Duration) -> Self {
        Self::with_clock(inner, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(inner: C, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        CachedCatalog {
            inner,
            ttl,
            clock,
            candidates: TtlMap::new(),
            fallback: TtlMap::new(),
            rules: TtlMap::new(),
            templates: TtlMap::new(),
            policies: TtlMap::new(),
            defaults: TtlMap::new(),
        }
    }

    /// Drops everything cached for one section.
    pub async fn invalidate(&self, section: &str) {
        self.candidates.remove(section).await;
        self.fallback.remove(section).await;
        self.rules.remove(section).await;
        self.policies.remove(section).await;
    }

    pub async fn clear(&self) {
        self.candidates.clear().await;
        self.fallback.clear().await;
        self.rules.clear().await;
        self.templates.clear().await;
        self.policies.clear().await;
        self.defaults.clear().await;
    }
}

#[async_trait]
impl<C: Catalog> Catalog for CachedCatalog<C> {
    async fn load_candidates(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
        self.candidates
            .get_or_load(section, self.clock.now(), self.ttl, || {
                self.inner.load_candidates(section)
            })
            .await
    }

    async fn load_fallback(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
        self.fallback
            .get_or_load(section, self.clock.now(), self.ttl, || {
                self.inner.load_fallback(section)
            })
            .await
    }

    async fn load_card_rules(&self, section: &str) -> Result<CardRules, EngineError> {
        self.rules
            .get_or_load(section, self.clock.now(), self.ttl, || {
                self.inner.load_card_rules(section)
            })
            .await
    }

    async fn load_highlight_templates(&self) -> Result<Option<HighlightTemplates>, EngineError> {
        self.templates
            .get_or_load(PACK_KEY, self.clock.now(), self.ttl, || {
                self.inner.load_highlight_templates()
            })
            .await
    }
}

#[async_trait]
impl<C: PolicyStore> PolicyStore for CachedCatalog<C> {
    async fn get(&self, section: &str) -> Result<Option<SelectionPolicy>, EngineError> {
        self.policies
            .get_or_load(section, self.clock.now(), self.ttl, || self.inner.get(section))
            .await
    }

    async fn assembler_defaults(&self) -> Result<AssemblerDefaults, EngineError> {
        self.defaults
            .get_or_load(PACK_KEY, self.clock.now(), self.ttl, || {
                self.inner.assembler_defaults()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::Category;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now = *now + by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Counts candidate loads that reach the wrapped catalog.
    struct CountingCatalog {
        inner: InMemoryCatalog,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl Catalog for CountingCatalog {
        async fn load_candidates(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_candidates(section).await
        }
        async fn load_fallback(&self, section: &str) -> Result<Vec<Candidate>, EngineError> {
            self.inner.load_fallback(section).await
        }
        async fn load_card_rules(&self, section: &str) -> Result<CardRules, EngineError> {
            self.inner.load_card_rules(section).await
        }
        async fn load_highlight_templates(&self) -> Result<Option<HighlightTemplates>, EngineError> {
            self.inner.load_highlight_templates().await
        }
    }

    fn make_cache() -> (CachedCatalog<CountingCatalog>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let inner = CountingCatalog {
            inner: InMemoryCatalog::new()
                .with_candidates("traits", vec![Candidate::new("t1", Category::NonAxis)]),
            loads: AtomicUsize::new(0),
        };
        let cache = CachedCatalog::with_clock(inner, Duration::seconds(60), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let (cache, clock) = make_cache();
        cache.load_candidates("traits").await.unwrap();
        clock.advance(Duration::seconds(59));
        let items = cache.load_candidates("traits").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(cache.inner.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reload_after_ttl() {
        let (cache, clock) = make_cache();
        cache.load_candidates("traits").await.unwrap();
        clock.advance(Duration::seconds(60));
        cache.load_candidates("traits").await.unwrap();
        assert_eq!(cache.inner.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let (cache, _clock) = make_cache();
        cache.load_candidates("traits").await.unwrap();
        cache.invalidate("traits").await;
        cache.load_candidates("traits").await.unwrap();
        assert_eq!(cache.inner.loads.load(Ordering::SeqCst), 2);

        cache.clear().await;
        cache.load_candidates("traits").await.unwrap();
        assert_eq!(cache.inner.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sections_cached_independently() {
        let (cache, _clock) = make_cache();
        cache.load_candidates("traits").await.unwrap();
        let other = cache.load_candidates("career").await.unwrap();
        assert!(other.is_empty());
        cache.invalidate("career").await;
        cache.load_candidates("traits").await.unwrap();
        assert_eq!(cache.inner.loads.load(Ordering::SeqCst), 2);
    }
}
