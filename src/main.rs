mod cli;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chain_form_guard::api::{self, AppState};
use chain_form_guard::audit::AuditLog;
use chain_form_guard::auth::{self, AdminAuth, InMemoryCredentials};
use chain_form_guard::chain::{ChainClient, EthClient, UserDataContract};
use chain_form_guard::classifier::{
    builtin_corpus, load_corpus, NaiveBayesClassifier, NaiveBayesModel, TextClassifier,
};
use chain_form_guard::config::{AdminPassword, Config};
use chain_form_guard::fraud::{self, FraudThresholds, TransactionProbe};
use chain_form_guard::gate::RequestGate;
use clap::Parser;
use ethers_core::types::{Address, U256};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { addr } => {
            let config = Config::from_env().context("failed to load configuration")?;
            let bind = addr.unwrap_or_else(|| config.http_bind_addr.clone());
            let state = build_state(&config).await?;
            api::run_http_server(&bind, state).await?;
        }
        Commands::Train { corpus, out } => {
            let samples = match corpus {
                Some(path) => load_corpus(&path)
                    .with_context(|| format!("failed to load corpus {}", path.display()))?,
                None => builtin_corpus(),
            };
            let model = NaiveBayesModel::fit(&samples).context("failed to fit classifier")?;
            model
                .save(&out)
                .with_context(|| format!("failed to write model {}", out.display()))?;
            tracing::info!(
                "trained on {} samples ({} features, classes {:?}) -> {}",
                samples.len(),
                model.vocabulary_len(),
                model.classes(),
                out.display()
            );
        }
        Commands::Classify { text } => {
            let config = Config::from_env().context("failed to load configuration")?;
            let classifier = load_classifier(config.model_path.as_deref());
            for input in text {
                let result = classifier.classify(&input);
                println!("{:<7} {:.4}  {}", result.label.as_str(), result.confidence, input);
            }
        }
        Commands::HashPassword { password } => {
            println!("{}", auth::hash_password(&password)?);
        }
        Commands::FraudCheck {
            gas_price,
            value,
            from,
            gas,
        } => {
            let config = Config::from_env().context("failed to load configuration")?;
            let chain = eth_client(&config)?;
            let probe = TransactionProbe {
                from: from
                    .as_deref()
                    .map(Address::from_str)
                    .transpose()
                    .context("invalid --from address")?,
                gas: U256::from(gas),
                gas_price: U256::from_dec_str(&gas_price).context("invalid --gas-price")?,
                value: U256::from_dec_str(&value).context("invalid --value")?,
            };
            let report = fraud::assess(&chain, &probe, &FraudThresholds::default()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    if config.uses_default_jwt_secret() {
        tracing::warn!("JWT_SECRET_KEY not set; using an insecure development secret");
    }

    let audit = AuditLog::open(&config.log_dir).context("failed to open audit logs")?;
    tracing::info!("audit logs in {}", config.log_dir.display());

    let classifier = load_classifier(config.model_path.as_deref());

    let chain = eth_client(config)?;
    if chain.is_connected().await {
        tracing::info!("connected to chain node at {}", config.eth_rpc_url);
    } else {
        tracing::warn!("chain node at {} is not reachable", config.eth_rpc_url);
    }

    let gate = RequestGate::new(Arc::new(classifier), Arc::new(chain))
        .with_threshold(config.classifier_threshold)
        .with_fraud_policy(config.fraud_policy);

    let credentials = match &config.admin_password {
        AdminPassword::Hash(phc) => {
            InMemoryCredentials::new().with_hash(&config.admin_username, phc)
        }
        AdminPassword::Plain(password) => {
            InMemoryCredentials::new().with_password(&config.admin_username, password)
        }
    }
    .context("failed to set up admin credentials")?;
    let auth = AdminAuth::new(
        &config.jwt_secret,
        chrono::Duration::seconds(config.token_ttl_secs),
        Arc::new(credentials),
    );

    Ok(AppState {
        gate: Arc::new(gate),
        auth: Arc::new(auth),
        audit: Arc::new(audit),
    })
}

fn eth_client(config: &Config) -> anyhow::Result<EthClient> {
    let contract = UserDataContract::new(
        config.contract_address,
        config.chain_id,
        config.tx_gas_limit,
    )?;
    Ok(EthClient::new(&config.eth_rpc_url, contract)?)
}

/// Model file when given, else the built-in corpus. Failures leave the
/// classifier unavailable rather than aborting.
fn load_classifier(model_path: Option<&Path>) -> NaiveBayesClassifier {
    let loaded = match model_path {
        Some(path) => NaiveBayesModel::load(path).map(NaiveBayesClassifier::new),
        None => NaiveBayesClassifier::from_builtin_corpus(),
    };
    match loaded {
        Ok(classifier) => {
            tracing::info!("classifier ready");
            classifier
        }
        Err(err) => {
            tracing::error!("classifier unavailable: {}", err);
            NaiveBayesClassifier::unavailable()
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}
