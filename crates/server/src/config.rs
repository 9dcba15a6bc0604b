use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Settings of the authorization server core.
///
/// Passed to every component at construction; nothing reads the process
/// environment after startup.
#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Config {
    /// Value of the `iss` claim in introspection responses.
    pub issuer_identity: String,
    /// Lifetime of authorization codes, in seconds.
    #[serde(default = "default_auth_code_lifetime")]
    pub auth_code_lifetime: i64,
    /// Lifetime of access tokens, in seconds. Also reported as `expires_in`.
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    /// Lifetime of refresh tokens, in seconds.
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
    /// Interval between purges of expired codes and tokens, in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl OAuth2Config {
    pub fn new(issuer_identity: impl Into<String>) -> Self {
        Self {
            issuer_identity: issuer_identity.into(),
            auth_code_lifetime: default_auth_code_lifetime(),
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            cleanup_interval: default_cleanup_interval(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer_identity.trim().is_empty() {
            return Err(ConfigError::Validation(
                "oauth2.issuer_identity must not be empty".into(),
            ));
        }
        for (name, value) in [
            ("auth_code_lifetime", self.auth_code_lifetime),
            ("access_token_lifetime", self.access_token_lifetime),
            ("refresh_token_lifetime", self.refresh_token_lifetime),
        ] {
            if value <= 0 {
                return Err(ConfigError::Validation(format!(
                    "oauth2.{name} must be > 0"
                )));
            }
        }
        if self.cleanup_interval == 0 {
            return Err(ConfigError::Validation(
                "oauth2.cleanup_interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_auth_code_lifetime() -> i64 {
    30
}

fn default_access_token_lifetime() -> i64 {
    86400 * 7
}

fn default_refresh_token_lifetime() -> i64 {
    86400 * 14
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub oauth2: OAuth2Config,
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any variable matching the key path separated by double underscores
/// (e.g. `OAUTH2__ACCESS_TOKEN_LIFETIME`) overrides the file value. A `.env`
/// file in the working directory is loaded first when present.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};

    dotenvy::dotenv().ok();

    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::Validation("database_url must be set".into()));
        }
        self.oauth2.validate()
    }
}
