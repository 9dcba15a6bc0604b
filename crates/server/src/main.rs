use oauth2_authz_server::api::start_webserver;
use oauth2_authz_server::config::load_config;
use oauth2_authz_server::oauth2::{DbUserCredentials, OAuth2State};
use sea_orm::Database;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "oauth2_authz_server=info,tower_http=info,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let config = load_config()?;

    let db = Arc::new(Database::connect(&config.database_url).await?);
    let credentials = Arc::new(DbUserCredentials::new(db.clone()));
    let state = OAuth2State::new(db, config.oauth2.clone(), credentials);

    tracing::info!(
        issuer = %config.oauth2.issuer_identity,
        auth_code_lifetime = config.oauth2.auth_code_lifetime,
        access_token_lifetime = config.oauth2.access_token_lifetime,
        refresh_token_lifetime = config.oauth2.refresh_token_lifetime,
        "OAuth2 configuration"
    );

    // Start background purge of expired codes and tokens
    {
        let state = state.clone();
        let period = Duration::from_secs(config.oauth2.cleanup_interval);
        tokio::spawn(async move {
            let mut interval = interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = state.purge_expired().await {
                    tracing::warn!(error = %e, "Failed to purge expired codes and tokens");
                }
            }
        });
    }

    start_webserver(state, &config.bind_address).await?;
    Ok(())
}
