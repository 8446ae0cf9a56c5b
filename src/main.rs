//! Runs the shop web service.

use shop_web::{
    app,
    infra::{config, logging, state::AppState},
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let _guard = logging::init_logging();
    let config = config::load_config()?;

    let listener = TcpListener::bind(format!(
        "{}:{}",
        config.server.http_address, config.server.http_port
    ))
    .await?;
    let state = AppState::from_config(config).await?;
    app::run_app(listener, state).await?;

    Ok(())
}
