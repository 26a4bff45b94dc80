//! Shared state passed to all API handlers

use std::sync::Arc;

use crate::cache::StateCache;
use crate::config::Settings;
use crate::metrics::Metrics;
use crate::scrape::Scraper;

/// Everything a handler may need: the orchestrator for `/metrics`, the cache
/// for the side-channel endpoints, the registry for rendering.
#[derive(Clone)]
pub struct ApiState {
    pub scraper: Arc<Scraper>,
    pub cache: Arc<StateCache>,
    pub metrics: Arc<Metrics>,
    pub settings: Settings,
}

impl ApiState {
    pub fn new(
        scraper: Arc<Scraper>,
        cache: Arc<StateCache>,
        metrics: Arc<Metrics>,
        settings: Settings,
    ) -> Self {
        Self {
            scraper,
            cache,
            metrics,
            settings,
        }
    }
}
