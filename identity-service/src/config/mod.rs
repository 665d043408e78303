use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::net::IpAddr;
use std::str::FromStr;

/// Signing secret used when none is configured outside production.
pub const DEV_JWT_SECRET: &str = "super-secret-dev-key-change-me";

const MIN_PROD_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub hashing: HashingConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub issuer: String,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub secure_cookies: bool,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    /// Peers whose `x-forwarded-for` header is believed.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let environment: Environment = vars.parse("ENVIRONMENT", Environment::Dev)?;
        let is_prod = environment == Environment::Prod;

        let config = IdentityConfig {
            common,
            environment,
            service_name: vars.string("SERVICE_NAME", "identity-service"),
            service_version: vars.string("SERVICE_VERSION", env!("CARGO_PKG_VERSION")),
            log_level: vars.string("LOG_LEVEL", "info"),
            otlp_endpoint: vars.get("OTLP_ENDPOINT").filter(|s| !s.trim().is_empty()),
            database: DatabaseConfig {
                url: Secret::new(vars.required(
                    "DATABASE_URL",
                    "postgres://localhost:5432/identity",
                    is_prod,
                )?),
                max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", 25)?,
                min_connections: vars.parse("DATABASE_MIN_CONNECTIONS", 2)?,
                acquire_timeout_seconds: vars.parse("DATABASE_ACQUIRE_TIMEOUT_SECONDS", 30)?,
                run_migrations: vars.parse("RUN_MIGRATIONS", true)?,
            },
            jwt: JwtConfig {
                secret: Secret::new(vars.required("JWT_SECRET", DEV_JWT_SECRET, is_prod)?),
                issuer: vars.string("JWT_ISSUER", "identity-service"),
            },
            hashing: {
                let defaults = HashingConfig::default();
                HashingConfig {
                    memory_kib: vars.parse("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
                    iterations: vars.parse("ARGON2_ITERATIONS", defaults.iterations)?,
                    parallelism: vars.parse("ARGON2_PARALLELISM", defaults.parallelism)?,
                }
            },
            security: SecurityConfig {
                allowed_origins: vars
                    .string("ALLOWED_ORIGINS", "http://localhost:3000")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                secure_cookies: vars.parse("SECURE_COOKIES", is_prod)?,
                request_timeout_seconds: vars.parse("REQUEST_TIMEOUT_SECONDS", 30)?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: vars.parse("RATE_LIMIT_LOGIN_ATTEMPTS", 5)?,
                login_window_seconds: vars.parse("RATE_LIMIT_LOGIN_WINDOW_SECONDS", 900)?,
                register_attempts: vars.parse("RATE_LIMIT_REGISTER_ATTEMPTS", 3)?,
                register_window_seconds: vars.parse("RATE_LIMIT_REGISTER_WINDOW_SECONDS", 3600)?,
                trusted_proxies: vars.list("TRUSTED_PROXIES")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.database.max_connections == 0
            || self.database.min_connections > self.database.max_connections
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS must not exceed a non-zero DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.jwt.secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }

        if self.hashing.parallelism == 0 || self.hashing.iterations == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ARGON2_ITERATIONS and ARGON2_PARALLELISM must be positive"
            )));
        }

        if self.security.request_timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REQUEST_TIMEOUT_SECONDS must be positive"
            )));
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            let secret = self.jwt.secret.expose_secret();
            if secret == DEV_JWT_SECRET || secret.len() < MIN_PROD_SECRET_LEN {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be a non-default value of at least {} bytes in production",
                    MIN_PROD_SECRET_LEN
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if !self.security.secure_cookies {
                tracing::warn!("SECURE_COOKIES is disabled in production");
            }
        }

        Ok(())
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Value that falls back to `default` in development but must be set in production.
    fn required(&self, key: &str, default: &str, is_prod: bool) -> Result<String, AppError> {
        match self.get(key) {
            Some(val) => Ok(val),
            None if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required in production but not set",
                key
            ))),
            None => Ok(default.to_string()),
        }
    }

    /// Comma-separated values; unset means empty.
    fn list<T>(&self, key: &str) -> Result<Vec<T>, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(key, "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|raw| {
                raw.parse().map_err(|e: T::Err| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
                })
            })
            .collect()
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
                AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
            }),
            None => Ok(default),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
