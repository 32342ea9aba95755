//! Per-channel deploy history dashboard.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::auth::{ChannelAccess, GrantGate, OneTimeTokenIssuer};
use crate::clock::format_timestamp;
use crate::deploy::Deploy;
use crate::grant::GrantKeys;
use crate::store::Store;

#[derive(Clone)]
pub struct DashboardState {
    pub history: Arc<dyn Store>,
    pub bootstrap: Arc<OneTimeTokenIssuer>,
    pub grants: GrantKeys,
}

impl GrantGate for DashboardState {
    fn grants(&self) -> &GrantKeys {
        &self.grants
    }

    fn bootstrap(&self) -> &OneTimeTokenIssuer {
        &self.bootstrap
    }
}

/// Extract the channel id from a request path: the first path segment, with
/// a trailing format extension stripped.
pub fn channel_id_from_path(path: &str) -> Option<String> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return None;
    }

    let channel = match (path.find('/'), path.rfind('.')) {
        (Some(n), _) => &path[..n],
        (None, Some(n)) => &path[..n],
        (None, None) => path,
    };

    if channel.is_empty() {
        None
    } else {
        Some(channel.to_string())
    }
}

/// Response format, negotiated by URL extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    PlainText,
    Json,
}

fn format_from_path(path: &str) -> Format {
    if path.ends_with(".json") {
        Format::Json
    } else {
        Format::PlainText
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    since: Option<String>,
}

/// How a deploy record appears in the JSON dashboard.
#[derive(Serialize)]
struct DeployPresenter<'a> {
    author: &'a str,
    subject: &'a str,
    started_at: u64,
    #[serde(skip_serializing_if = "is_zero")]
    finished_at: u64,
    #[serde(skip_serializing_if = "is_false")]
    aborted: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    reason: &'a str,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

pub async fn handler(
    State(state): State<DashboardState>,
    access: ChannelAccess,
    uri: Uri,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let format = format_from_path(uri.path());

    let since = match query.since.as_deref().map(str::parse::<u64>) {
        None => None,
        Some(Ok(t)) => Some(t),
        Some(Err(_)) => {
            return respond_error(
                format,
                StatusCode::BAD_REQUEST,
                "Malformed time in `since` parameter",
            );
        }
    };

    let history = match since {
        Some(t) => state.history.since(&access.channel, t).await,
        None => state.history.all(&access.channel).await,
    };
    let history = match history {
        Ok(history) => history,
        Err(e) => {
            tracing::error!(channel = %access.channel, error = %e, "Failed to read deploy history");
            return respond_error(format, StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    match format {
        Format::Json => render_json(&history),
        Format::PlainText => render_plain_text(&history),
    }
}

fn respond_error(format: Format, status: StatusCode, message: &str) -> Response {
    match format {
        Format::Json => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            serde_json::json!({ "error": message }).to_string(),
        )
            .into_response(),
        Format::PlainText => (status, message.to_string()).into_response(),
    }
}

fn render_json(history: &[Deploy]) -> Response {
    let presenters: Vec<DeployPresenter> = history
        .iter()
        .map(|d| DeployPresenter {
            author: &d.user.name,
            subject: &d.subject,
            started_at: d.started_at,
            finished_at: d.finished_at,
            aborted: d.aborted,
            reason: &d.abort_reason,
        })
        .collect();

    axum::Json(presenters).into_response()
}

fn render_plain_text(history: &[Deploy]) -> Response {
    let mut out = String::from("Deploy history\n--------------\n\n");

    if history.is_empty() {
        out.push_str("  No deploys in channel so far\n");
    }
    for d in history {
        if d.finished() {
            out.push_str(&format!(
                "  * {} was deploying {} since {} until {}\n",
                d.user.name,
                d.subject,
                format_timestamp(d.started_at),
                format_timestamp(d.finished_at)
            ));
        } else {
            out.push_str(&format!(
                "  * {} is currently deploying {} since {}\n",
                d.user.name,
                d.subject,
                format_timestamp(d.started_at)
            ));
        }
    }

    ([(header::CONTENT_TYPE, "text/plain")], out).into_response()
}
