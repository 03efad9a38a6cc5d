use crate::error::ConfigError;

/// Secrets shipped in `configuration.yaml` for local development only.
pub const DEV_ACCESS_SECRET: &str = "your-secret-key-change-in-production";
pub const DEV_REFRESH_SECRET: &str = "your-refresh-secret-key-change-in-production";

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    #[serde(default)]
    pub store: StoreSettings,
    pub database: Option<DatabaseSettings>,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Which credential store backs the service
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(serde::Deserialize, Clone, Default)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT signing settings.
///
/// Access and refresh tokens are signed with distinct secrets so that an
/// access token can never be presented as a refresh token.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64, // seconds
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64, // seconds
    pub issuer: String,
}

fn default_access_expiry() -> i64 {
    15 * 60
}

fn default_refresh_expiry() -> i64 {
    7 * 24 * 60 * 60
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_secret".to_string()));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_secret".to_string()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "jwt.access_secret and jwt.refresh_secret must differ".to_string(),
            ));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt token lifetimes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn uses_development_secrets(&self) -> bool {
        self.access_secret == DEV_ACCESS_SECRET || self.refresh_secret == DEV_REFRESH_SECRET
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
