use std::process::exit;

use log::{error, info};
use recipe_share::{config::Config, routes, state::State};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info,sqlx=warn");
    env_logger::Builder::from_env(env).init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            exit(1);
        }
    };
    let port = config.port;

    let state = match State::connect(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialise state: {e}");
            exit(1);
        }
    };

    let (address, server) = warp::serve(routes::api(state))
        .bind_with_graceful_shutdown(([0, 0, 0, 0], port), shutdown_signal());

    info!("Listening on {address}");
    server.await;
}
