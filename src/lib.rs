pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod deploy;
pub mod grant;
pub mod store;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use api::{CommandState, DashboardState, create_router};
use auth::{OneTimeTokenIssuer, RandomTokenSource, StaticToken};
use deploy::ChannelDeploys;
use grant::GrantKeys;
use store::Store;

pub struct ServerConfig {
    /// Deploy record storage (in-memory or SQLite)
    pub store: Arc<dyn Store>,
    /// Shared secret the chat platform sends with every webhook call
    pub verification_token: String,
    /// HMAC secret for signing dashboard access grants
    pub grant_secret: Vec<u8>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let bootstrap = Arc::new(OneTimeTokenIssuer::new(Box::new(RandomTokenSource::new())));

    let command_state = CommandState {
        deploys: Arc::new(ChannelDeploys::new(config.store.clone())),
        dashboard_tokens: bootstrap.clone(),
        verification: Arc::new(StaticToken(config.verification_token.clone())),
    };

    let dashboard_state = DashboardState {
        history: config.store.clone(),
        bootstrap,
        grants: GrantKeys::new(&config.grant_secret),
    };

    create_router(command_state, dashboard_state)
}

/// Run the server on the given listener. This function blocks until the
/// server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}
