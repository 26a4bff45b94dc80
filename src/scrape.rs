//! Scrape orchestration.
//!
//! One scrape cycle fans out one query task per target and waits for every task
//! to settle. Targets are fully isolated from each other: a timeout, protocol
//! error, or panic in one task never cancels or delays the others. There is no
//! per-target retry inside a cycle — the monitoring system's next scrape is the
//! retry.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::cache::{CacheEntry, StateCache};
use crate::config::Target;
use crate::metrics::Metrics;
use crate::normalize::normalize;
use crate::query::QueryProvider;

/// Runs scrape cycles against injected collaborators.
///
/// Holding the provider behind `Arc<dyn QueryProvider>` keeps the orchestrator
/// testable against fakes.
pub struct Scraper {
    provider: Arc<dyn QueryProvider>,
    cache: Arc<StateCache>,
    metrics: Arc<Metrics>,
    /// A cycle resets the per-entity series before repopulating them, so two
    /// overlapping cycles would wipe each other's fresh series mid-flight.
    cycle_lock: Mutex<()>,
}

impl Scraper {
    pub fn new(
        provider: Arc<dyn QueryProvider>,
        cache: Arc<StateCache>,
        metrics: Arc<Metrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            cache,
            metrics,
            cycle_lock: Mutex::new(()),
        })
    }

    /// Query all targets concurrently and wait for every query to settle.
    /// Cycles themselves never overlap; a second caller waits its turn.
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn run_cycle(&self, targets: Vec<Target>) {
        let _cycle = self.cycle_lock.lock().await;

        // Per-entity series carry payload-derived labels; drop last cycle's
        // before repopulating so nothing stale leaks into this exposition.
        self.metrics.reset_per_entity_series();

        let mut handles = Vec::with_capacity(targets.len());
        for target in &targets {
            let provider = Arc::clone(&self.provider);
            let cache = Arc::clone(&self.cache);
            let metrics = Arc::clone(&self.metrics);
            let target = target.clone();

            handles.push(tokio::spawn(async move {
                scrape_target(provider, cache, metrics, target).await;
            }));
        }

        // Settle-all join: individual failures were already recorded inside the
        // tasks; a join error here means a task panicked.
        for (target, result) in targets.iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                error!("query task for {} panicked: {e}", target.name);
                self.metrics.record_failure(target);
                self.cache.delete(&target.name).await;
            }
        }
    }
}

async fn scrape_target(
    provider: Arc<dyn QueryProvider>,
    cache: Arc<StateCache>,
    metrics: Arc<Metrics>,
    target: Target,
) {
    match provider
        .query(&target.game_type, &target.host, target.port)
        .await
    {
        Ok(raw) => {
            let snapshot = normalize(&target.name, &raw);
            let raw_payload = serde_json::to_value(&raw.raw)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));

            info!(
                "{} ({}): {}/{} players (ping: {}ms)",
                target.name,
                target.game_type,
                snapshot.players_count,
                snapshot.max_players,
                snapshot.ping_ms
            );

            metrics.record_success(&target, &snapshot, &raw_payload);
            cache
                .put(
                    &target.name,
                    CacheEntry {
                        snapshot,
                        game: target.game_type.clone(),
                        raw: raw_payload,
                        timestamp: Utc::now(),
                    },
                )
                .await;
        }
        Err(e) => {
            warn!(
                "query failed for {} ({}:{}): {e:#}",
                target.name, target.host, target.port
            );
            metrics.record_failure(&target);
            cache.delete(&target.name).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawPlayer, RawSnapshot, RawValue};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Fake provider answering from a fixed table; unknown targets fail.
    struct FakeProvider {
        snapshots: HashMap<String, RawSnapshot>,
    }

    #[async_trait]
    impl QueryProvider for FakeProvider {
        async fn query(&self, _game_type: &str, host: &str, port: u16) -> Result<RawSnapshot> {
            self.snapshots
                .get(&format!("{host}:{port}"))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    fn target(name: &str, host: &str) -> Target {
        Target {
            name: name.to_string(),
            host: host.to_string(),
            port: 27015,
            game_type: String::from("cs2"),
        }
    }

    fn sample_snapshot() -> RawSnapshot {
        RawSnapshot {
            players: vec![RawPlayer {
                name: Some(String::from("Ana")),
                score: Some(RawValue::Text(String::from("10"))),
            }],
            maxplayers: Some(RawValue::Text(String::from("20"))),
            ping: Some(RawValue::Text(String::from("45.5"))),
            ..Default::default()
        }
    }

    fn scraper_with(snapshots: HashMap<String, RawSnapshot>) -> (Arc<Scraper>, Arc<StateCache>, Arc<Metrics>) {
        let cache = StateCache::new();
        let metrics = Metrics::new().unwrap();
        let provider = Arc::new(FakeProvider { snapshots });
        let scraper = Scraper::new(provider, Arc::clone(&cache), Arc::clone(&metrics));
        (scraper, cache, metrics)
    }

    #[tokio::test]
    async fn test_success_populates_cache_and_metrics() {
        let mut snapshots = HashMap::new();
        snapshots.insert(String::from("1.2.3.4:27015"), sample_snapshot());
        let (scraper, cache, metrics) = scraper_with(snapshots);

        let started = Utc::now();
        scraper.run_cycle(vec![target("cs-1", "1.2.3.4")]).await;

        let entry = cache.get("cs-1").await.unwrap();
        assert_eq!(entry.snapshot.players_count, 1);
        assert_eq!(entry.snapshot.max_players, 20);
        assert!(entry.timestamp >= started);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"game_server_online{game="cs2",host="1.2.3.4",port="27015",server_name="cs-1"} 1"#));
        assert!(text.contains(r#"game_server_player_score{game="cs2",host="1.2.3.4",player_index="0",player_name="Ana",port="27015",server_name="cs-1"} 10"#));
    }

    #[tokio::test]
    async fn test_failure_evicts_cache_and_marks_offline() {
        let mut snapshots = HashMap::new();
        snapshots.insert(String::from("1.2.3.4:27015"), sample_snapshot());
        let (scraper, cache, metrics) = scraper_with(snapshots);

        // First cycle succeeds and populates the cache.
        scraper.run_cycle(vec![target("cs-1", "1.2.3.4")]).await;
        assert!(cache.get("cs-1").await.is_some());

        // Reconfigure the same name onto an unreachable host: now it fails.
        scraper.run_cycle(vec![target("cs-1", "10.9.9.9")]).await;

        assert!(cache.get("cs-1").await.is_none());
        let text = metrics.render().unwrap();
        assert!(text.contains(r#"game_server_online{game="cs2",host="10.9.9.9",port="27015",server_name="cs-1"} 0"#));
        assert!(text.contains("game_server_query_errors_total"));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_poison_siblings() {
        let mut snapshots = HashMap::new();
        snapshots.insert(String::from("1.2.3.4:27015"), sample_snapshot());
        let (scraper, cache, _metrics) = scraper_with(snapshots);

        scraper
            .run_cycle(vec![
                target("cs-1", "1.2.3.4"),
                target("down-1", "10.9.9.9"),
            ])
            .await;

        assert!(cache.get("cs-1").await.is_some());
        assert!(cache.get("down-1").await.is_none());
    }

    #[tokio::test]
    async fn test_repeated_offline_cycles_are_idempotent() {
        let (scraper, cache, metrics) = scraper_with(HashMap::new());

        scraper.run_cycle(vec![target("cs-1", "10.9.9.9")]).await;
        scraper.run_cycle(vec![target("cs-1", "10.9.9.9")]).await;

        assert!(cache.get("cs-1").await.is_none());
        let text = metrics.render().unwrap();
        assert!(text.contains(r#"game_server_online{game="cs2",host="10.9.9.9",port="27015",server_name="cs-1"} 0"#));
        assert!(text.contains(r#"game_server_query_errors_total{game="cs2",host="10.9.9.9",port="27015",server_name="cs-1"} 2"#));
    }

    #[tokio::test]
    async fn test_concurrent_cycles_do_not_overlap() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        /// Counts how many queries run at once. Each cycle below carries a
        /// single target, so any overlap must come from overlapping cycles.
        struct SlowProvider {
            in_flight: AtomicUsize,
            max_in_flight: AtomicUsize,
        }

        #[async_trait]
        impl QueryProvider for SlowProvider {
            async fn query(&self, _: &str, _: &str, _: u16) -> Result<RawSnapshot> {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(RawSnapshot::default())
            }
        }

        let provider = Arc::new(SlowProvider {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let cache = StateCache::new();
        let metrics = Metrics::new().unwrap();
        let provider_dyn: Arc<dyn QueryProvider> = provider.clone();
        let scraper = Scraper::new(provider_dyn, cache, metrics);

        tokio::join!(
            scraper.run_cycle(vec![target("cs-1", "1.2.3.4")]),
            scraper.run_cycle(vec![target("cs-2", "1.2.3.5")]),
        );

        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_player_series_cleared_between_cycles() {
        let mut snapshots = HashMap::new();
        snapshots.insert(String::from("1.2.3.4:27015"), sample_snapshot());
        let (scraper, _cache, metrics) = scraper_with(snapshots);

        scraper.run_cycle(vec![target("cs-1", "1.2.3.4")]).await;
        assert!(metrics.render().unwrap().contains(r#"player_name="Ana""#));

        // Same name now fails: the roster must disappear from the exposition.
        scraper.run_cycle(vec![target("cs-1", "10.9.9.9")]).await;
        assert!(!metrics.render().unwrap().contains(r#"player_name="Ana""#));
    }
}
