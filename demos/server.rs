//! Demo server: reflect DATABASE_URL and serve the generated API.

use restable::{bootstrap, ApiConfig};
use std::collections::HashMap;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("restable=info".parse()?))
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/restable".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let config = ApiConfig::from_env();
    let state = bootstrap(pool, config, &HashMap::new()).await?;
    let app = restable::api_router(state);

    let bind = std::env::var("RESTABLE_BIND").unwrap_or_else(|_| "0.0.0.0:5000".into());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
