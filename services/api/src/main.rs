use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use api::{
    routes,
    server::{self, shutdown_signal},
    state::{AppState, Components, PgBackend, ServiceSettings},
};
use auth::{JwtConfig, JwtService, OidcClient, OidcConfig, rate_limiter::RateLimiterConfig};
use common::{
    config::Settings,
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    telemetry::init_tracing,
};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    init_tracing(&settings.log);

    info!("Starting API service");

    let db_config = DatabaseConfig::from_settings(&settings.database)?;
    let pool = init_pool(&db_config).await?;

    if !health_check(&pool).await? {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    let jwt = JwtService::new(JwtConfig::from_settings(&settings.auth))
        .context("Invalid token issuer configuration")?;

    let oidc = if settings.oidc.enabled {
        let client = OidcClient::discover(OidcConfig::from_settings(&settings.oidc))
            .await
            .context("OIDC discovery failed")?;
        info!("OIDC provider {} discovered", settings.oidc.provider_url);
        Some(Arc::new(client))
    } else {
        info!("OIDC disabled; only local tokens are accepted");
        None
    };

    let state: AppState<PgBackend> = AppState::new(
        Components::postgres(&pool),
        ServiceSettings {
            jwt,
            oidc,
            rate_limits: RateLimiterConfig::from_settings(&settings.auth),
            number_strategy: settings.orders.number_strategy,
        },
    )
    .with_pool(pool);

    let app = server::with_request_timeout(
        routes::create_router(state),
        Duration::from_secs(settings.server.request_timeout),
    );

    let addr = format!("0.0.0.0:{}", settings.server.rest_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API service listening on {}", addr);

    server::serve(
        listener,
        app,
        Duration::from_secs(settings.server.shutdown_timeout),
        shutdown_signal(),
    )
    .await?;

    info!("API service stopped");
    Ok(())
}
