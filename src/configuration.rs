use crate::auth::DEFAULT_PASSWORD_HASH_COST;
use crate::error::ConfigError;

/// Lowest and highest cost factors bcrypt accepts
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// One year
const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;
/// Ten years
const MAX_REFRESH_TOKEN_TTL_HOURS: i64 = 10 * 365 * 24;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
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

    /// Server-level connection, used to create databases
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token and credential settings handed to the auth core at construction
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    #[serde(default)]
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_hours: i64,
    pub password_hash_cost: u32,
}

impl AuthSettings {
    /// Checks the settings the service cannot run without.
    ///
    /// # Errors
    /// - `MissingRequired` when no signing secret is configured
    /// - `InvalidValue` for a TTL outside `1..=max` or an out-of-range bcrypt cost
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if !(1..=MAX_ACCESS_TOKEN_TTL_MINUTES).contains(&self.access_token_ttl_minutes) {
            return Err(ConfigError::InvalidValue(format!(
                "ACCESS_TOKEN_TTL_MIN must be between 1 and {}",
                MAX_ACCESS_TOKEN_TTL_MINUTES
            )));
        }
        if !(1..=MAX_REFRESH_TOKEN_TTL_HOURS).contains(&self.refresh_token_ttl_hours) {
            return Err(ConfigError::InvalidValue(format!(
                "REFRESH_TOKEN_TTL_HOUR must be between 1 and {}",
                MAX_REFRESH_TOKEN_TTL_HOURS
            )));
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.password_hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "BCRYPT_COST must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }
        Ok(())
    }

    pub fn access_token_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_minutes(self.access_token_ttl_minutes).ok_or_else(|| {
            ConfigError::InvalidValue("ACCESS_TOKEN_TTL_MIN out of range".to_string())
        })
    }

    pub fn refresh_token_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_hours(self.refresh_token_ttl_hours).ok_or_else(|| {
            ConfigError::InvalidValue("REFRESH_TOKEN_TTL_HOUR out of range".to_string())
        })
    }
}

/// Environment variables and the settings keys they override
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("JWT_SECRET", "auth.jwt_secret"),
    ("ACCESS_TOKEN_TTL_MIN", "auth.access_token_ttl_minutes"),
    ("REFRESH_TOKEN_TTL_HOUR", "auth.refresh_token_ttl_hours"),
    ("BCRYPT_COST", "auth.password_hash_cost"),
    ("APP_HOST", "application.host"),
    ("APP_PORT", "application.port"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.username"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.database_name"),
];

/// Load settings from defaults, an optional `configuration` file and the
/// process environment, then validate them.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = load_settings()?;
    settings.auth.validate()?;
    Ok(settings)
}

/// Same sources as `get_configuration`, without validating the auth section.
/// For tooling that only needs the database settings.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080_i64)?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432_i64)?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.database_name", "tokengate")?
        .set_default("auth.access_token_ttl_minutes", 15_i64)?
        .set_default("auth.refresh_token_ttl_hours", 720_i64)?
        .set_default("auth.password_hash_cost", i64::from(DEFAULT_PASSWORD_HASH_COST))?
        .add_source(config::File::with_name("configuration").required(false));

    for (var, key) in ENV_OVERRIDES {
        builder = builder.set_override_option(*key, std::env::var(var).ok())?;
    }

    Ok(builder.build()?.try_deserialize::<Settings>()?)
}
