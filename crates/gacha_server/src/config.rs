//! # Server Configuration
//!
//! One TOML file configures the transport and every collaborator:
//!
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1:8080"
//!
//! [auth]
//! secret = "<64 hex digits>"      # or secret_file = "config/token.key"
//! token_ttl_secs = 86400
//!
//! [draw]
//! batch_size = 10000
//!
//! [catalog]
//! path = "data/catalog.toml"
//!
//! [store]
//! journal_path = "data/ownership.journal"   # absent = in-memory
//!
//! [ledger]
//! kind = "memory"                  # "memory" | "simulated" | "chain"
//! balances = { alice = 100 }
//! ```
//!
//! Relative paths resolve against the working directory.

use alloy_primitives::hex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use gacha_economy::{DrawConfig, TokenAuthenticator, DEFAULT_BATCH_SIZE};

use crate::errors::StartupError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GACHA_CONFIG";

/// Config file used when neither an argument nor [`CONFIG_ENV`] is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/gacha.toml";

/// Top-level configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GachaConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Credential signing.
    pub auth: AuthConfig,
    /// Orchestrator tuning.
    #[serde(default)]
    pub draw: DrawSection,
    /// Catalog source.
    pub catalog: CatalogConfig,
    /// Ownership Store selection.
    #[serde(default)]
    pub store: StoreConfig,
    /// Ledger selection.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// `[server]`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// `[auth]`
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Signing key, 32 bytes as hex.
    #[serde(default)]
    pub secret: Option<String>,
    /// File holding the hex signing key.
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
    /// Lifetime of issued credentials.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl AuthConfig {
    /// Reads and decodes the signing key.
    ///
    /// # Errors
    ///
    /// Fails unless exactly one of `secret`/`secret_file` is set and it holds
    /// 32 hex-encoded bytes.
    pub fn signing_key(&self) -> Result<[u8; 32], StartupError> {
        let text = match (&self.secret, &self.secret_file) {
            (Some(secret), None) => secret.clone(),
            (None, Some(path)) => read(path)?,
            _ => {
                return Err(StartupError::Config(
                    "auth: set exactly one of secret or secret_file".to_string(),
                ))
            }
        };

        let bytes = hex::decode(text.trim())
            .map_err(|e| StartupError::Config(format!("auth: secret is not hex: {e}")))?;
        <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
            StartupError::Config(format!(
                "auth: secret must be 32 bytes, got {}",
                bytes.len()
            ))
        })
    }

    /// Builds the authenticator.
    ///
    /// # Errors
    ///
    /// See [`AuthConfig::signing_key`].
    pub fn authenticator(&self) -> Result<TokenAuthenticator, StartupError> {
        Ok(TokenAuthenticator::new(self.signing_key()?))
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("secret_file", &self.secret_file)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

/// `[draw]`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrawSection {
    /// Ownership records per store call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DrawSection {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl DrawSection {
    /// Orchestrator tuning for this section.
    #[must_use]
    pub fn draw_config(&self) -> DrawConfig {
        DrawConfig {
            batch_size: self.batch_size,
        }
    }
}

/// `[catalog]`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Catalog TOML file.
    pub path: PathBuf,
}

/// `[store]`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Journal file. In-memory store when absent.
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
}

/// `[ledger]`, selected by `kind`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum LedgerConfig {
    /// In-process balances.
    Memory {
        /// Starting balance per user id.
        #[serde(default)]
        balances: BTreeMap<String, u64>,
    },
    /// In-process token contract.
    Simulated {
        /// User id to address. Users only in `mint` get a derived address.
        #[serde(default)]
        accounts: BTreeMap<String, String>,
        /// Tokens minted per user id at startup.
        #[serde(default)]
        mint: BTreeMap<String, u64>,
    },
    /// Token contract on a JSON-RPC node.
    Chain {
        /// Node endpoint.
        rpc_url: String,
        /// Token contract address.
        contract: String,
        /// User id to node-managed address.
        accounts: BTreeMap<String, String>,
        /// Delay between receipt lookups.
        #[serde(default = "default_receipt_poll_ms")]
        receipt_poll_ms: u64,
        /// Lookups before a burn is declared indeterminate.
        #[serde(default = "default_receipt_attempts")]
        receipt_attempts: u32,
        /// Per-request HTTP timeout.
        #[serde(default = "default_rpc_timeout_ms")]
        request_timeout_ms: u64,
    },
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::Memory {
            balances: BTreeMap::new(),
        }
    }
}

impl LedgerConfig {
    /// Name of the selected kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Simulated { .. } => "simulated",
            Self::Chain { .. } => "chain",
        }
    }
}

impl GachaConfig {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&read(path)?)?;
        tracing::info!(
            "Loaded config {} (ledger: {})",
            path.display(),
            config.ledger.kind()
        );
        Ok(config)
    }

    /// Parses and validates config text.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors, unknown keys or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self, StartupError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), StartupError> {
        if self.draw.batch_size == 0 {
            return Err(StartupError::Config(
                "draw: batch_size must be at least 1".to_string(),
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(StartupError::Config(
                "auth: token_ttl_secs must be at least 1".to_string(),
            ));
        }
        if let LedgerConfig::Chain {
            receipt_attempts: 0,
            ..
        } = self.ledger
        {
            return Err(StartupError::Config(
                "ledger: receipt_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Picks the config path: first CLI argument, then [`CONFIG_ENV`], then
/// [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn config_path(arg: Option<String>) -> PathBuf {
    arg.or_else(|| std::env::var(CONFIG_ENV).ok())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

fn read(path: &Path) -> Result<String, StartupError> {
    std::fs::read_to_string(path).map_err(|source| StartupError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

const fn default_token_ttl() -> u64 {
    86_400
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

const fn default_receipt_poll_ms() -> u64 {
    500
}

const fn default_receipt_attempts() -> u32 {
    60
}

const fn default_rpc_timeout_ms() -> u64 {
    10_000
}
