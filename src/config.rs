//! Target list ingestion and runtime settings.
//!
//! The target list is re-read from disk on every scrape so the exporter always
//! mirrors the file Prometheus itself is configured with (file service discovery
//! format: an array of `{targets, labels}` groups). A `GAME_SERVERS` environment
//! variable acts as a secondary source when the file is missing or malformed.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

const PORT: &str = "PORT";
const SCRAPE_INTERVAL: &str = "SCRAPE_INTERVAL";
const TARGETS_JSON_FILE: &str = "TARGETS_JSON_FILE";
const GAME_SERVERS: &str = "GAME_SERVERS";

const DEFAULT_PORT: u16 = 9090;
const DEFAULT_SCRAPE_INTERVAL_MS: u64 = 30_000;
const DEFAULT_TARGETS_FILE: &str = "/etc/prometheus/targets.json";

/// One game server to monitor. Built fresh each scrape; `name` is the unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub game_type: String,
}

/// One group in the Prometheus file-SD targets file.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetGroup {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Entry shape of the `GAME_SERVERS` fallback variable.
#[derive(Debug, Clone, Deserialize)]
struct EnvTarget {
    name: Option<String>,
    host: String,
    port: u16,
    #[serde(rename = "type")]
    game_type: String,
}

/// Process-level settings, all overridable via environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Port the HTTP surface binds to.
    pub port: u16,

    /// Suggested scrape interval in milliseconds. The exporter is pull-based and
    /// never self-triggers; this is read and logged for operators only.
    pub scrape_interval_ms: u64,

    /// Path to the Prometheus file-SD targets file.
    pub targets_file: String,
}

impl Settings {
    pub fn from_env() -> Self {
        let port = std::env::var(PORT)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let scrape_interval_ms = std::env::var(SCRAPE_INTERVAL)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SCRAPE_INTERVAL_MS);
        let targets_file = std::env::var(TARGETS_JSON_FILE)
            .unwrap_or_else(|_| DEFAULT_TARGETS_FILE.to_string());

        Self {
            port,
            scrape_interval_ms,
            targets_file,
        }
    }
}

/// Load the current target list.
///
/// Reads the targets file, falling back to `GAME_SERVERS` when the file is
/// unreadable, malformed, or yields no entries. Never fails: the worst outcome
/// is an empty list.
pub fn load_targets(targets_file: &str) -> Vec<Target> {
    match std::fs::read_to_string(targets_file) {
        Ok(content) => {
            let targets = parse_target_groups(&content);
            if targets.is_empty() {
                warn!("no usable targets in {targets_file}, trying {GAME_SERVERS}");
                env_fallback()
            } else {
                debug!("loaded {} target(s) from {targets_file}", targets.len());
                targets
            }
        }
        Err(e) => {
            warn!("could not read {targets_file}: {e}, trying {GAME_SERVERS}");
            env_fallback()
        }
    }
}

/// Parse the file-SD JSON into targets. Malformed groups or endpoints are
/// skipped with a warning; they never abort the rest of the load.
pub fn parse_target_groups(content: &str) -> Vec<Target> {
    let groups: Vec<TargetGroup> = match serde_json::from_str(content) {
        Ok(groups) => groups,
        Err(e) => {
            warn!("targets file is not valid file-SD JSON: {e}");
            return vec![];
        }
    };

    let mut targets = Vec::new();
    for group in &groups {
        let game_type = group
            .labels
            .get("gamedig-type")
            .or_else(|| group.labels.get("gamedig_type"))
            .cloned()
            .unwrap_or_else(|| String::from("unknown"));

        for endpoint in &group.targets {
            let Some((host, port)) = parse_endpoint(endpoint) else {
                warn!("skipping malformed target endpoint {endpoint:?}");
                continue;
            };

            let name = group
                .labels
                .get("name")
                .cloned()
                .unwrap_or_else(|| format!("{game_type}-{host}-{port}"));

            targets.push(Target {
                name,
                host,
                port,
                game_type: game_type.clone(),
            });
        }
    }

    targets
}

/// Split a `"host:port"` endpoint string. `None` for anything that does not
/// parse into a host and an unsigned 16-bit port.
pub fn parse_endpoint(endpoint: &str) -> Option<(String, u16)> {
    let (host, port) = endpoint.split_once(':')?;
    if host.is_empty() {
        return None;
    }
    let port = port.parse::<u16>().ok()?;
    Some((host.to_string(), port))
}

fn env_fallback() -> Vec<Target> {
    match std::env::var(GAME_SERVERS) {
        Ok(value) => parse_env_targets(&value),
        Err(_) => {
            warn!("no targets configured, exporting an empty server set");
            vec![]
        }
    }
}

/// Parse the `GAME_SERVERS` JSON array of `{name, host, port, type}` objects.
pub fn parse_env_targets(value: &str) -> Vec<Target> {
    let entries: Vec<EnvTarget> = match serde_json::from_str(value) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("{GAME_SERVERS} is not a valid JSON target list: {e}");
            return vec![];
        }
    };

    entries
        .into_iter()
        .map(|entry| {
            let name = entry.name.unwrap_or_else(|| {
                format!("{}-{}-{}", entry.game_type, entry.host, entry.port)
            });
            Target {
                name,
                host: entry.host,
                port: entry.port,
                game_type: entry.game_type,
            }
        })
        .collect()
}
