use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "chain-form-guard",
    version,
    about = "Screens form fields for injection payloads before drafting contract calls"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Override bind address, e.g. 0.0.0.0:5002
        #[arg(long)]
        addr: Option<String>,
    },
    /// Fit the classifier and write the model as JSON
    Train {
        /// JSON array of {"text", "label"}; built-in corpus when omitted
        #[arg(long)]
        corpus: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print label and confidence for each input
    Classify {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Print an argon2 hash for ADMIN_PASSWORD_HASH
    HashPassword { password: String },
    /// Run the fraud heuristic against the live node
    FraudCheck {
        /// Gas price in wei
        #[arg(long)]
        gas_price: String,
        /// Value in wei
        #[arg(long, default_value = "0")]
        value: String,
        /// Sender address
        #[arg(long)]
        from: Option<String>,
        #[arg(long, default_value_t = 21_000)]
        gas: u64,
    },
}
