use tracing_subscriber::EnvFilter;

use skyhop_server::config::ServerConfig;
use skyhop_server::{build_app, spawn_inactivity_sweeper};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SKYHOP_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = ServerConfig::load();
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }
    let addr = config.listen_addr.clone();

    let (app, state) = build_app(config);
    spawn_inactivity_sweeper(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind listen address");
            std::process::exit(1);
        },
    };

    tracing::info!(%addr, "Skyhop relay listening");
    tracing::info!("Health check available at http://{addr}/health");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
