pub mod command;
pub mod dashboard;
mod error;
pub mod response;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

pub use command::CommandState;
pub use dashboard::DashboardState;

use crate::auth::{exchange_bootstrap_token, require_token};

/// Create the application router.
///
/// The command endpoint sits behind the strict verification-token check; the
/// dashboard sits behind the bootstrap-exchange middleware with per-channel
/// grant authorization enforced in the handler's extractor.
pub fn create_router(command_state: CommandState, dashboard_state: DashboardState) -> Router {
    let command_routes = Router::new()
        .route("/deploy", post(command::handler))
        .layer(middleware::from_fn_with_state(
            command_state.clone(),
            require_token::<CommandState>,
        ))
        .with_state(command_state);

    let dashboard_routes = Router::new()
        .route("/{channel}", get(dashboard::handler))
        .layer(middleware::from_fn_with_state(
            dashboard_state.clone(),
            exchange_bootstrap_token::<DashboardState>,
        ))
        .with_state(dashboard_state);

    command_routes.merge(dashboard_routes)
}
