pub mod api;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod normalize;
pub mod query;
pub mod scrape;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single scalar from a game server response.
///
/// Query providers aggregate dozens of heterogeneous game protocols and make no
/// promises about field types: the same field may arrive as a number, a numeric
/// string, a boolean, or something else entirely. This enum classifies each value
/// exactly once at deserialization; the normalizer resolves it into a
/// `(numeric, display)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

/// One player entry as reported by the provider. Both fields are unreliable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlayer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub score: Option<RawValue>,
}

/// A raw status snapshot for one server, as returned by a query provider.
///
/// Every field is optional or defaulted on purpose; normalization is where the
/// loose shape becomes a fixed one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub map: Option<String>,
    #[serde(default)]
    pub ping: Option<RawValue>,
    #[serde(default)]
    pub players: Vec<RawPlayer>,
    #[serde(default)]
    pub bots: Vec<serde_json::Value>,
    #[serde(default)]
    pub maxplayers: Option<RawValue>,
    /// Game-specific key/value pairs outside the fixed schema. A `BTreeMap`
    /// keeps iteration order stable so metric output is deterministic.
    #[serde(default)]
    pub raw: BTreeMap<String, RawValue>,
}
