//! The `/deploy` slash-command webhook.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, header};
use serde::Deserialize;

use super::error::{ApiError, ResultExt};
use super::response::{Attachment, SlashResponse, escape_message};
use crate::auth::{DEFAULT_TOKEN_LENGTH, OneTimeTokenIssuer, TokenAuthenticator, TokenGate};
use crate::clock::format_timestamp;
use crate::deploy::{ChannelDeploys, ChatUser, Deploy};

const HELP_MESSAGE: &str = "Available commands:

/deploy help - print help (this message)
/deploy <subject> - announce deploy of <subject> in channel
/deploy status - show deploy status in channel
/deploy done - finish deploy
/deploy history - get a link to history of deploys in this channel";

#[derive(Clone)]
pub struct CommandState {
    pub deploys: Arc<ChannelDeploys>,
    pub dashboard_tokens: Arc<OneTimeTokenIssuer>,
    pub verification: Arc<dyn TokenAuthenticator>,
}

impl TokenGate for CommandState {
    fn token_authenticator(&self) -> &dyn TokenAuthenticator {
        self.verification.as_ref()
    }
}

/// Webhook payload of a slash-command invocation. The verification token is
/// consumed by the `require_token` middleware before the handler runs.
#[derive(Debug, Deserialize)]
pub struct CommandForm {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub text: String,
}

pub async fn handler(
    State(state): State<CommandState>,
    headers: HeaderMap,
    Form(form): Form<CommandForm>,
) -> Result<Json<SlashResponse>, ApiError> {
    if form.command != "/deploy" {
        return Ok(Json(SlashResponse::ephemeral(format!(
            "`{}` returned an error not supported",
            escape_message(&form.command)
        ))));
    }

    let user = ChatUser {
        id: form.user_id,
        name: form.user_name,
    };
    let channel = form.channel_id;

    let response = match form.text.trim() {
        "" | "help" => SlashResponse::ephemeral(HELP_MESSAGE),
        "status" => status(&state, &channel).await?,
        "done" => done(&state, &channel, &user).await?,
        "history" => history(&state, &headers, &channel)?,
        subject => start(&state, &channel, user, subject).await?,
    };

    Ok(Json(response))
}

async fn status(state: &CommandState, channel: &str) -> Result<SlashResponse, ApiError> {
    match state
        .deploys
        .current(channel)
        .await
        .store_err("Failed to read current deploy")?
    {
        Some(d) if !d.finished() => Ok(SlashResponse::ephemeral(format!(
            "{} is deploying {} since {}",
            d.user.name,
            escape_message(&d.subject),
            format_timestamp(d.started_at)
        ))),
        _ => Ok(SlashResponse::ephemeral("No one is deploying at the moment")),
    }
}

async fn done(
    state: &CommandState,
    channel: &str,
    user: &ChatUser,
) -> Result<SlashResponse, ApiError> {
    let current = state
        .deploys
        .current(channel)
        .await
        .store_err("Failed to read current deploy")?;
    let Some(current) = current.filter(|d| !d.finished()) else {
        return Ok(SlashResponse::ephemeral("No one is deploying at the moment"));
    };

    if current.user.id == user.id {
        state
            .deploys
            .finish(channel)
            .await
            .store_err("Failed to finish deploy")?;
        Ok(SlashResponse::in_channel(format!(
            "{} done deploying",
            user.name
        )))
    } else {
        let reason = format!("interrupted by {}", user.name);
        state
            .deploys
            .abort(channel, &reason)
            .await
            .store_err("Failed to abort deploy")?;
        Ok(SlashResponse::in_channel(format!(
            "{} has finished the deploy started by {}",
            user.name, current.user.name
        )))
    }
}

fn history(
    state: &CommandState,
    headers: &HeaderMap,
    channel: &str,
) -> Result<SlashResponse, ApiError> {
    let token = state
        .dashboard_tokens
        .issue_token(DEFAULT_TOKEN_LENGTH)
        .map_err(|e| ApiError::internal("Failed to issue dashboard token", e))?;

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let host = host
        .strip_suffix(":443")
        .or_else(|| host.strip_suffix(":80"))
        .unwrap_or(host);

    Ok(SlashResponse::ephemeral(format!(
        "Click <https://{}/{}?token={}|here> to see deploy history in this channel",
        host, channel, token
    )))
}

async fn start(
    state: &CommandState,
    channel: &str,
    user: ChatUser,
    subject: &str,
) -> Result<SlashResponse, ApiError> {
    let candidate = Deploy::new(user, subject);
    let (deploy, started) = state
        .deploys
        .start(channel, candidate)
        .await
        .store_err("Failed to start deploy")?;

    if !started {
        return Ok(SlashResponse::ephemeral(format!(
            "{} is deploying since {}. You can type `/deploy done` if you think this deploy is finished.",
            deploy.user.name,
            format_timestamp(deploy.started_at)
        )));
    }

    let mut response = SlashResponse::in_channel(format!(
        "{} is about to deploy {}",
        deploy.user.name,
        escape_message(&deploy.subject)
    ));
    for pr in &deploy.pull_requests {
        response.attachments.push(Attachment {
            title: format!("{}#{}", pr.repository, pr.id),
            title_link: format!("https://github.com/{}/pull/{}", pr.repository, pr.id),
        });
    }

    Ok(response)
}
