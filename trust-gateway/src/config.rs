//! Gateway configuration loaded from environment variables.

use std::fmt;
use std::net::SocketAddr;

use trust_engine::EngineConfig;

/// Listen address used when `TRUST_GATEWAY_LISTEN_ADDR` is unset.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8002";

const LISTEN_ADDR: &str = "TRUST_GATEWAY_LISTEN_ADDR";
const SECRET_KEY: &str = "TRUST_GATEWAY_SECRET_KEY";
const JWT_SECRET: &str = "TRUST_GATEWAY_JWT_SECRET";
const API_KEY: &str = "TRUST_GATEWAY_API_KEY";
const TOKEN_ISSUER: &str = "TRUST_GATEWAY_TOKEN_ISSUER";

/// Gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Receipt signing secret.
    pub secret_key: String,
    /// Capability token secret; the receipt secret is used when absent.
    pub jwt_secret: Option<String>,
    /// Value required in the `x-api-key` header.
    pub api_key: String,
    pub token_issuer: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(String),
    #[error("invalid listen address: {0}")]
    InvalidAddr(#[from] std::net::AddrParseError),
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingVar`] if a required variable is unset or
    /// empty, and [`ConfigError::InvalidAddr`] for an unparsable listen address.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, treating empty values as unset.
    ///
    /// # Errors
    /// See [`GatewayConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require =
            |name: &str| get(name).ok_or_else(|| ConfigError::MissingVar(name.to_owned()));

        let listen_addr = get(LISTEN_ADDR)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned())
            .parse::<SocketAddr>()?;

        Ok(Self {
            listen_addr,
            secret_key: require(SECRET_KEY)?,
            jwt_secret: get(JWT_SECRET),
            api_key: require(API_KEY)?,
            token_issuer: get(TOKEN_ISSUER),
        })
    }

    /// Engine configuration derived from these settings.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.secret_key.as_bytes());
        if let Some(secret) = &self.jwt_secret {
            config = config.with_token_secret(secret.as_bytes());
        }
        if let Some(issuer) = &self.token_issuer {
            config = config.with_issuer(issuer.clone());
        }
        config
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("secret_key", &"<redacted>")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("api_key", &"<redacted>")
            .field("token_issuer", &self.token_issuer)
            .finish()
    }
}
