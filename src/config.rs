use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use ethers_core::types::Address;

use crate::fraud::FraudPolicy;

pub const DEFAULT_JWT_SECRET: &str = "insecure-dev-secret-set-JWT_SECRET_KEY";
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x7635615a00cbC897Bd020468C4338B194C8CC948";

#[derive(Debug, Clone)]
pub struct Config {
    pub eth_rpc_url: String,
    pub contract_address: Address,
    pub chain_id: u64,
    pub tx_gas_limit: u64,
    pub http_bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub admin_username: String,
    pub admin_password: AdminPassword,
    pub log_dir: PathBuf,
    pub classifier_threshold: f64,
    pub model_path: Option<PathBuf>,
    pub fraud_policy: FraudPolicy,
}

/// Where the admin credential comes from.
#[derive(Clone)]
pub enum AdminPassword {
    /// Pre-hashed argon2 PHC string.
    Hash(String),
    Plain(String),
}

impl std::fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminPassword::Hash(_) => f.write_str("Hash(..)"),
            AdminPassword::Plain(_) => f.write_str("Plain(..)"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid CONTRACT_ADDRESS {0:?}")]
    InvalidContractAddress(String),
    #[error("invalid value {value:?} for {var}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("CLASSIFIER_THRESHOLD must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),
    #[error("invalid FRAUD_POLICY {0:?}, expected log-only or enforce")]
    InvalidFraudPolicy(String),
    #[error("TOKEN_TTL_SECS must be positive, got {0}")]
    NonPositiveTokenTtl(i64),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let eth_rpc_url =
            env::var("ETH_RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());

        let raw_contract =
            env::var("CONTRACT_ADDRESS").unwrap_or_else(|_| DEFAULT_CONTRACT_ADDRESS.to_string());
        let contract_address = Address::from_str(raw_contract.trim())
            .map_err(|_| ConfigError::InvalidContractAddress(raw_contract.clone()))?;

        let chain_id = parse_var("CHAIN_ID", 1337u64)?;
        let tx_gas_limit = parse_var("TX_GAS_LIMIT", 2_000_000u64)?;
        let http_bind_addr = env::var("HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:5002".to_string());

        let jwt_secret = env::var("JWT_SECRET_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());
        let token_ttl_secs = positive_ttl(parse_var("TOKEN_TTL_SECS", 3600i64)?)?;

        let admin_username = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password = match env::var("ADMIN_PASSWORD_HASH") {
            Ok(hash) if !hash.is_empty() => AdminPassword::Hash(hash),
            _ => AdminPassword::Plain(
                env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
            ),
        };

        let log_dir = env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs"));

        let classifier_threshold = parse_var("CLASSIFIER_THRESHOLD", 0.75f64)?;
        if !(0.0..=1.0).contains(&classifier_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(classifier_threshold));
        }

        let model_path = env::var("MODEL_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let fraud_policy = match env::var("FRAUD_POLICY") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidFraudPolicy(raw))?,
            Err(_) => FraudPolicy::default(),
        };

        Ok(Self {
            eth_rpc_url,
            contract_address,
            chain_id,
            tx_gas_limit,
            http_bind_addr,
            jwt_secret,
            token_ttl_secs,
            admin_username,
            admin_password,
            log_dir,
            classifier_threshold,
            model_path,
            fraud_policy,
        })
    }

    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

fn positive_ttl(secs: i64) -> Result<i64, ConfigError> {
    if secs > 0 {
        Ok(secs)
    } else {
        Err(ConfigError::NonPositiveTokenTtl(secs))
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
