//! Snapshot normalization.
//!
//! Converts one loosely-typed [`RawSnapshot`] into a fully-populated
//! [`NormalizedSnapshot`]: scalar gauges, flattened raw fields, and a
//! deduplicated player list. Pure and total — every coercion has a defined
//! fallback, so a snapshot is either fully normalized or the target is treated
//! as offline by the caller. Nothing in here panics on provider data.

use serde::Serialize;
use tracing::{debug, warn};

use crate::{RawSnapshot, RawValue};

/// Upper bound on player names used as metric label values.
const MAX_PLAYER_NAME_LEN: usize = 100;

/// Upper bound on raw field display values used as metric label values.
const MAX_FIELD_VALUE_LEN: usize = 200;

/// Fixed-schema snapshot derived from a [`RawSnapshot`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedSnapshot {
    pub players_count: u64,
    pub max_players: u64,
    pub bots_count: u64,
    pub ping_ms: f64,
    pub hostname: String,
    pub map: String,
    pub raw_fields: Vec<RawField>,
    pub players: Vec<PlayerEntry>,
}

/// One flattened raw field: a numeric value for the metric sample and a display
/// value for the label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawField {
    pub name: String,
    pub numeric_value: f64,
    pub display_value: String,
}

/// One player, identified by `(name, index)` within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerEntry {
    pub name: String,
    pub score: f64,
    pub index: usize,
}

impl RawValue {
    /// Best-effort numeric reading of a provider scalar. `None` when the value
    /// has no finite numeric interpretation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) if n.is_finite() => Some(*n),
            RawValue::Number(_) => None,
            RawValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            RawValue::Other(_) => None,
        }
    }
}

/// Coerce an optional scalar to a non-negative count, truncating toward zero.
fn coerce_count(value: Option<&RawValue>) -> u64 {
    match value.and_then(RawValue::as_f64) {
        Some(n) if n > 0.0 => n.trunc() as u64,
        Some(_) => 0,
        None => {
            if let Some(v) = value {
                debug!("count field {v:?} has no numeric reading, defaulting to 0");
            }
            0
        }
    }
}

/// Coerce an optional scalar to a non-negative float.
fn coerce_float(value: Option<&RawValue>) -> f64 {
    match value.and_then(RawValue::as_f64) {
        Some(n) => n.max(0.0),
        None => {
            if let Some(v) = value {
                debug!("float field {v:?} has no numeric reading, defaulting to 0");
            }
            0.0
        }
    }
}

/// Clip a string to at most `max` characters, respecting char boundaries.
pub(crate) fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Flatten arbitrary raw fields into `(numeric, display)` records.
///
/// A repeated identical `(name, display)` pair within one snapshot is dropped
/// with a warning; some providers report the same entity twice in one response.
pub fn flatten_raw_fields(
    target_name: &str,
    fields: impl IntoIterator<Item = (String, RawValue)>,
) -> Vec<RawField> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for (name, value) in fields {
        let (numeric_value, display_value) = match &value {
            RawValue::Bool(b) => (if *b { 1.0 } else { 0.0 }, b.to_string()),
            RawValue::Number(n) if n.is_finite() => (*n, n.to_string()),
            // JSON cannot carry non-finite numbers, but the type can.
            RawValue::Number(_) => (0.0, String::from("0")),
            RawValue::Text(s) => match value.as_f64() {
                // Numeric-looking string: keep the original formatting as label.
                Some(n) => (n, clip(s, MAX_FIELD_VALUE_LEN)),
                // Presence sentinel, value lives in the label.
                None => (1.0, clip(s, MAX_FIELD_VALUE_LEN)),
            },
            RawValue::Other(v) => (1.0, clip(&v.to_string(), MAX_FIELD_VALUE_LEN)),
        };

        if !seen.insert((name.clone(), display_value.clone())) {
            warn!("duplicate raw field {name} = {display_value} on {target_name}, skipping");
            continue;
        }

        out.push(RawField {
            name,
            numeric_value,
            display_value,
        });
    }

    out
}

/// Build the deduplicated player list. Unnamed players get a fallback display
/// name; names are clipped before they ever become label values.
fn normalize_players(target_name: &str, raw: &RawSnapshot) -> Vec<PlayerEntry> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for (index, player) in raw.players.iter().enumerate() {
        let name = match player.name.as_deref() {
            Some(name) if !name.is_empty() => clip(name, MAX_PLAYER_NAME_LEN),
            _ => String::from("unnamed"),
        };
        // Scores may be negative (deaths-weighted scoreboards), so no clamp.
        let score = player
            .score
            .as_ref()
            .and_then(RawValue::as_f64)
            .unwrap_or_default();

        if !seen.insert((name.clone(), index)) {
            warn!("duplicate player {name} (index {index}) on {target_name}, skipping");
            continue;
        }

        out.push(PlayerEntry { name, score, index });
    }

    out
}

/// Derive the human-facing hostname: a game-specific `sv_hostname` raw field
/// wins, then the provider's generic name, then empty.
fn derive_hostname(raw: &RawSnapshot) -> String {
    if let Some(RawValue::Text(hostname)) = raw.raw.get("sv_hostname")
        && !hostname.is_empty()
    {
        return hostname.clone();
    }
    raw.name.clone().unwrap_or_default()
}

/// Normalize one raw snapshot. Total: never fails, never panics.
pub fn normalize(target_name: &str, raw: &RawSnapshot) -> NormalizedSnapshot {
    NormalizedSnapshot {
        players_count: raw.players.len() as u64,
        max_players: coerce_count(raw.maxplayers.as_ref()),
        bots_count: raw.bots.len() as u64,
        ping_ms: coerce_float(raw.ping.as_ref()),
        hostname: derive_hostname(raw),
        map: raw.map.clone().unwrap_or_default(),
        raw_fields: flatten_raw_fields(
            target_name,
            raw.raw.iter().map(|(k, v)| (k.clone(), v.clone())),
        ),
        players: normalize_players(target_name, raw),
    }
}
