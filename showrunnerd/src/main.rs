//! Control surface daemon.
//!
//! Connects to the broadcast backend and the content directory, then
//! exposes the show runner over HTTP.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showrunner_engine::{HttpShowDirectory, ShowRunner};
use showrunner_obs::{ObsClient, StageMap};

mod config;
mod routes;

use config::Config;
use routes::AppState;

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "showrunnerd=debug,showrunner_engine=debug,showrunner_queue=debug,showrunner_obs=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    info!("Show runner starting");

    if let Err(e) = run().await {
        error!("Fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;

    let control = ObsClient::connect(
        &config.obs_host,
        config.obs_port,
        config.obs_password.as_deref(),
    )
    .await?;
    let directory = HttpShowDirectory::new(
        config.directory_url.clone(),
        config.directory_api_key.clone(),
    );

    let runner = ShowRunner::new(Arc::new(control), Arc::new(directory), StageMap::default());

    // Mirror engine events into the daemon log.
    let mut events = runner.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(?event, "Engine event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let state = Arc::new(AppState {
        runner,
        api_key: config.api_key.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Control surface listening");
    axum::serve(listener, routes::router(state)).await?;
    Ok(())
}
