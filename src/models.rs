use ethers_core::types::{Address, Bytes, U256};
use ethers_core::utils::to_checksum;
use serde::{Deserialize, Serialize};

/// Free-text form submitted to `/predict`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: String,
    /// Wallet that will sign the drafted call, when the client knows it.
    #[serde(default)]
    pub from: Option<String>,
}

impl TransactionRequest {
    /// Fields in the order they are screened.
    pub fn fields(&self) -> [(FormField, &str); 3] {
        [
            (FormField::Name, self.name.as_str()),
            (FormField::Address, self.address.as_str()),
            (FormField::Location, self.location.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormField {
    Name,
    Address,
    Location,
}

impl FormField {
    pub fn as_str(self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::Address => "address",
            FormField::Location => "location",
        }
    }
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract call drafted for the end user's wallet. Nonce and signature are
/// left to the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub to: Address,
    pub data: Bytes,
    pub gas: U256,
    pub gas_price: U256,
    pub chain_id: u64,
}

/// Wire shape of [`UnsignedTransaction`]; quantities are decimal strings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    pub to: String,
    pub data: String,
    pub gas: String,
    pub gas_price: String,
    pub chain_id: u64,
}

impl From<&UnsignedTransaction> for TransactionData {
    fn from(tx: &UnsignedTransaction) -> Self {
        Self {
            to: to_checksum(&tx.to, None),
            data: tx.data.to_string(),
            gas: tx.gas.to_string(),
            gas_price: tx.gas_price.to_string(),
            chain_id: tx.chain_id,
        }
    }
}
