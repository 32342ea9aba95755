use bosun::cli::{Args, build_config, init_logging, load_grant_secret, open_store};
use bosun::run_server;
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(grant_secret) = load_grant_secret(args.grant_secret) else {
        std::process::exit(1);
    };

    let Some(store) = open_store(args.database.as_deref()).await else {
        std::process::exit(1);
    };

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap();

    let config = build_config(store, args.verification_token, grant_secret);

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
