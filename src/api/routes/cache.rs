//! Side-channel endpoints over the state cache.
//!
//! These are read-only views of the last scrape cycle's results, meant for
//! ad-hoc inspection and dashboard text panels. They never trigger a query: a
//! target that has not been successfully scraped (or just failed) is simply a
//! 404 here.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::cache::CacheEntry;

#[derive(Debug, Deserialize)]
pub struct ServerNameQuery {
    server_name: Option<String>,
}

/// Resolve the required `server_name` parameter against the cache.
async fn lookup(
    state: &ApiState,
    query: ServerNameQuery,
) -> Result<(String, CacheEntry), ApiError> {
    let Some(name) = query.server_name.filter(|name| !name.is_empty()) else {
        return Err(ApiError::InvalidRequest(String::from(
            "server_name query parameter is required",
        )));
    };

    match state.cache.get(&name).await {
        Some(entry) => Ok((name, entry)),
        None => Err(ApiError::NotFound(String::from(
            "server not found or no data available",
        ))),
    }
}

/// GET /players?server_name=
pub async fn get_players(
    State(state): State<ApiState>,
    Query(query): Query<ServerNameQuery>,
) -> ApiResult<Json<Value>> {
    let (name, entry) = lookup(&state, query).await?;

    Ok(Json(json!({
        "server_name": name,
        "players": entry.snapshot.players,
        "timestamp": entry.timestamp.to_rfc3339(),
    })))
}

/// GET /server-info?server_name=
///
/// The full cached picture, raw payload included.
pub async fn get_server_info(
    State(state): State<ApiState>,
    Query(query): Query<ServerNameQuery>,
) -> ApiResult<Json<Value>> {
    let (name, entry) = lookup(&state, query).await?;

    let mut body = serde_json::to_value(&entry)
        .map_err(|e| ApiError::Internal(format!("failed to serialize cache entry: {e}")))?;
    if let Value::Object(map) = &mut body {
        map.insert(String::from("server_name"), Value::String(name));
    }

    Ok(Json(body))
}

/// GET /players-html?server_name=
pub async fn get_players_html(
    State(state): State<ApiState>,
    Query(query): Query<ServerNameQuery>,
) -> Response {
    let (_, entry) = match lookup(&state, query).await {
        Ok(found) => found,
        Err(e) => return e.into_html_response(),
    };

    if entry.snapshot.players.is_empty() {
        return Html(String::from("<p>No players online right now.</p>")).into_response();
    }

    let mut html = String::from(
        r#"<table style="width: 100%; border-collapse: collapse; border: 1px solid #444;">"#,
    );
    html.push_str(r#"<thead><tr style="background: #2d2d2d;">"#);
    for heading in ["#", "Name", "Score"] {
        html.push_str(&format!(
            r#"<th style="border: 1px solid #444; padding: 8px; text-align: left;">{heading}</th>"#
        ));
    }
    html.push_str("</tr></thead><tbody>");

    for player in &entry.snapshot.players {
        html.push_str("<tr>");
        html.push_str(&format!(
            r#"<td style="border: 1px solid #444; padding: 8px;">{}</td>"#,
            player.index + 1
        ));
        html.push_str(&format!(
            r#"<td style="border: 1px solid #444; padding: 8px;">{}</td>"#,
            escape_html(&player.name)
        ));
        html.push_str(&format!(
            r#"<td style="border: 1px solid #444; padding: 8px;">{}</td>"#,
            player.score
        ));
        html.push_str("</tr>");
    }

    html.push_str("</tbody></table>");
    html.push_str(&format!(
        r#"<p style="margin-top: 10px; font-size: 12px; color: #999;">Updated: {}</p>"#,
        entry.timestamp.to_rfc3339()
    ));

    Html(html).into_response()
}

/// GET /server-info-html?server_name=
pub async fn get_server_info_html(
    State(state): State<ApiState>,
    Query(query): Query<ServerNameQuery>,
) -> Response {
    let (_, entry) = match lookup(&state, query).await {
        Ok(found) => found,
        Err(e) => return e.into_html_response(),
    };

    let mut html =
        String::from(r#"<table style="width: 100%; border-collapse: collapse; margin-bottom: 20px;">"#);
    for (label, value) in [
        ("Hostname", entry.snapshot.hostname.as_str()),
        ("Map", entry.snapshot.map.as_str()),
        ("Game", entry.game.as_str()),
    ] {
        let value = if value.is_empty() { "N/A" } else { value };
        html.push_str(&format!(
            r#"<tr><td style="border: 1px solid #444; padding: 8px; font-weight: bold; background: #2d2d2d;">{label}:</td><td style="border: 1px solid #444; padding: 8px;">{}</td></tr>"#,
            escape_html(value)
        ));
    }
    html.push_str("</table>");

    let raw = serde_json::to_string_pretty(&entry.raw).unwrap_or_else(|_| String::from("{}"));
    html.push_str(r#"<h4 style="margin-top: 20px;">Raw data:</h4>"#);
    html.push_str(&format!(
        r#"<pre style="background: #1f1f1f; padding: 10px; border-radius: 4px; overflow-x: auto; font-size: 11px; max-height: 400px; overflow-y: auto;">{}</pre>"#,
        escape_html(&raw)
    ));

    Html(html).into_response()
}

/// Player names and raw payloads come from untrusted servers; escape them
/// before they land in dashboard-embedded HTML.
pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain name"), "plain name");
    }
}
