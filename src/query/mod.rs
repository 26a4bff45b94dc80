//! Query provider capability.
//!
//! The wire protocols spoken by individual games are not this crate's concern:
//! a provider takes `(game type, host, port)` and either returns a raw snapshot
//! or fails. The trait seam lets the scrape orchestrator run against fakes in
//! tests and against the HTTP bridge in production.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;

use crate::RawSnapshot;

pub use http::HttpBridgeProvider;

/// A capability that can query one game server for its current status.
///
/// Implementations must be `Send + Sync`; one query may be in flight per target
/// during a scrape cycle. The provider owns its own timeout — callers impose no
/// additional deadline.
#[async_trait]
pub trait QueryProvider: Send + Sync {
    async fn query(&self, game_type: &str, host: &str, port: u16) -> Result<RawSnapshot>;
}
