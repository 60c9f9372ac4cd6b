use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use cdn_relay::{relay_router, startup_banner, RelayConfig, RelayState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::fmt()
        .with_file(true)
        .init();

    let config = RelayConfig::from_env()?;

    startup_banner(&config);

    let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, config.port));

    let state = Arc::new(RelayState::new(config).await);

    tracing::info!("Listening on: {}", addr);

    axum::Server::bind(&addr)
        .serve(relay_router(state).into_make_service())
        .await?;

    Ok(())
}
