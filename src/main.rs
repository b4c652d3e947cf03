use agency_commercial::{app, build_state, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agency_commercial=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let state = build_state(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Commercial service listening on {}", config.bind_addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
