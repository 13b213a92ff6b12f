use position_aware::{config, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env()?;
    let port = config.port;
    tracing::info!(
        reference_length = config.grid.reference_length,
        max_pointing_deviation = config.grid.max_pointing_deviation,
        public_dir = %config.public_dir.display(),
        "grid configured"
    );

    let state = state::AppState::new(config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "position-aware listening");
    axum::serve(listener, app).await?;
    Ok(())
}
