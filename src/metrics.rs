//! Metrics registry.
//!
//! Owns a dedicated prometheus [`Registry`] (not the global default) plus every
//! exported series. The orchestrator writes into it per target; the `/metrics`
//! handler renders it with the text encoder. All series carry the base labels
//! `server_name`, `game`, `host`, `port`.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::config::Target;
use crate::normalize::NormalizedSnapshot;

const BASE_LABELS: [&str; 4] = ["server_name", "game", "host", "port"];

/// Upper bound on the JSON blob exposed in the `raw_data` label.
const MAX_RAW_INFO_LEN: usize = 1000;

pub struct Metrics {
    registry: Registry,

    players_current: IntGaugeVec,
    players_max: IntGaugeVec,
    bots: IntGaugeVec,
    ping_ms: GaugeVec,
    online: IntGaugeVec,
    query_errors: IntCounterVec,

    // Per-entity series: label sets vary with the payload, so these are reset
    // at the start of every cycle to keep stale series out of the exposition.
    hostname_info: GaugeVec,
    map_info: GaugeVec,
    map_value: GaugeVec,
    raw_info: GaugeVec,
    raw_field: GaugeVec,
    player_info: GaugeVec,
    player_score: GaugeVec,
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    extra_labels: &[&str],
) -> Result<GaugeVec> {
    let labels: Vec<&str> = BASE_LABELS.iter().chain(extra_labels).copied().collect();
    let vec = GaugeVec::new(Opts::new(name, help), &labels)
        .with_context(|| format!("invalid metric definition for {name}"))?;
    registry
        .register(Box::new(vec.clone()))
        .with_context(|| format!("failed to register {name}"))?;
    Ok(vec)
}

fn int_gauge_vec(registry: &Registry, name: &str, help: &str) -> Result<IntGaugeVec> {
    let vec = IntGaugeVec::new(Opts::new(name, help), &BASE_LABELS)
        .with_context(|| format!("invalid metric definition for {name}"))?;
    registry
        .register(Box::new(vec.clone()))
        .with_context(|| format!("failed to register {name}"))?;
    Ok(vec)
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>> {
        let registry = Registry::new();

        let players_current = int_gauge_vec(
            &registry,
            "game_server_players_current",
            "Current number of players on the server",
        )?;
        let players_max = int_gauge_vec(
            &registry,
            "game_server_players_max",
            "Maximum number of players on the server",
        )?;
        let bots = int_gauge_vec(
            &registry,
            "game_server_bots",
            "Number of bots on the server",
        )?;
        let ping_ms = gauge_vec(
            &registry,
            "game_server_ping_ms",
            "Server latency in milliseconds",
            &[],
        )?;
        let online = int_gauge_vec(
            &registry,
            "game_server_online",
            "Whether the server is online (1) or offline (0)",
        )?;

        let query_errors = IntCounterVec::new(
            Opts::new(
                "game_server_query_errors_total",
                "Total number of failed server queries",
            ),
            &BASE_LABELS,
        )
        .context("invalid metric definition for game_server_query_errors_total")?;
        registry
            .register(Box::new(query_errors.clone()))
            .context("failed to register game_server_query_errors_total")?;

        let hostname_info = gauge_vec(
            &registry,
            "game_server_hostname_info",
            "Game server hostname (always 1, hostname in the label)",
            &["hostname"],
        )?;
        let map_info = gauge_vec(
            &registry,
            "game_server_map_info",
            "Current server map (always 1, map in the label)",
            &["map"],
        )?;
        let map_value = gauge_vec(
            &registry,
            "game_server_map",
            "Current server map for stat panels (always 1, map_name in the label)",
            &["map_name"],
        )?;
        let raw_info = gauge_vec(
            &registry,
            "game_server_raw_info",
            "Raw server payload as a JSON string label (always 1)",
            &["raw_data"],
        )?;
        let raw_field = gauge_vec(
            &registry,
            "game_server_raw_field",
            "Individual raw payload field (numeric value, field_name and field_value in labels)",
            &["field_name", "field_value"],
        )?;
        let player_info = gauge_vec(
            &registry,
            "game_server_player_info",
            "Player presence (always 1, player_name in the label)",
            &["player_name", "player_index"],
        )?;
        let player_score = gauge_vec(
            &registry,
            "game_server_player_score",
            "Player score",
            &["player_name", "player_index"],
        )?;

        Ok(Arc::new(Self {
            registry,
            players_current,
            players_max,
            bots,
            ping_ms,
            online,
            query_errors,
            hostname_info,
            map_info,
            map_value,
            raw_info,
            raw_field,
            player_info,
            player_score,
        }))
    }

    /// Drop all per-entity series so a cycle only exposes what it observed.
    ///
    /// Label sets on these vectors come from the payload (players, maps, raw
    /// fields); without a reset, a player who left would keep a series forever.
    pub fn reset_per_entity_series(&self) {
        self.hostname_info.reset();
        self.map_info.reset();
        self.map_value.reset();
        self.raw_info.reset();
        self.raw_field.reset();
        self.player_info.reset();
        self.player_score.reset();
    }

    /// Record one successfully normalized snapshot.
    pub fn record_success(
        &self,
        target: &Target,
        snapshot: &NormalizedSnapshot,
        raw_payload: &serde_json::Value,
    ) {
        let port = target.port.to_string();
        let base = [
            target.name.as_str(),
            target.game_type.as_str(),
            target.host.as_str(),
            port.as_str(),
        ];

        self.online.with_label_values(&base).set(1);
        self.players_current
            .with_label_values(&base)
            .set(snapshot.players_count as i64);
        self.players_max
            .with_label_values(&base)
            .set(snapshot.max_players as i64);
        self.bots
            .with_label_values(&base)
            .set(snapshot.bots_count as i64);
        self.ping_ms.with_label_values(&base).set(snapshot.ping_ms);

        if !snapshot.hostname.is_empty() {
            let labels = with_extra(&base, &[snapshot.hostname.as_str()]);
            self.hostname_info.with_label_values(&labels).set(1.0);
        }

        if !snapshot.map.is_empty() {
            let labels = with_extra(&base, &[snapshot.map.as_str()]);
            self.map_info.with_label_values(&labels).set(1.0);
            self.map_value.with_label_values(&labels).set(1.0);
        }

        let raw_json = raw_payload.to_string();
        if raw_json != "{}" && raw_json != "null" {
            let clipped = crate::normalize::clip(&raw_json, MAX_RAW_INFO_LEN);
            let labels = with_extra(&base, &[clipped.as_str()]);
            self.raw_info.with_label_values(&labels).set(1.0);
        }

        for field in &snapshot.raw_fields {
            let labels = with_extra(&base, &[field.name.as_str(), field.display_value.as_str()]);
            self.raw_field
                .with_label_values(&labels)
                .set(field.numeric_value);
        }

        for player in &snapshot.players {
            let index = player.index.to_string();
            let labels = with_extra(&base, &[player.name.as_str(), index.as_str()]);
            self.player_info.with_label_values(&labels).set(1.0);
            self.player_score
                .with_label_values(&labels)
                .set(player.score);
        }
    }

    /// Record a failed query: the target is offline for this cycle.
    pub fn record_failure(&self, target: &Target) {
        let port = target.port.to_string();
        let base = [
            target.name.as_str(),
            target.game_type.as_str(),
            target.host.as_str(),
            port.as_str(),
        ];

        self.online.with_label_values(&base).set(0);
        self.query_errors.with_label_values(&base).inc();
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics exposition is not valid UTF-8")
    }

    /// Content type of [`Metrics::render`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn with_extra<'a>(base: &[&'a str; 4], extra: &[&'a str]) -> Vec<&'a str> {
    base.iter().chain(extra).copied().collect()
}
