use async_trait::async_trait;
use ethers_core::abi::{parse_abi, Function, Token};
use ethers_core::types::{Address, Block, BlockId, BlockNumber, Bytes, Transaction, U256};
use ethers_providers::{Http, Middleware, Provider, ProviderError};
use futures_util::future::try_join_all;
use url::Url;

use crate::models::{TransactionRequest, UnsignedTransaction};

const SAVE_USER_DATA: &str =
    "function saveUserData(string _name, string _userAddress, string _location)";

#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    #[error("chain node unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode contract call: {0}")]
    Encoding(String),
    #[error("invalid chain client setup: {0}")]
    Setup(String),
}

impl From<ProviderError> for ChainError {
    fn from(err: ProviderError) -> Self {
        ChainError::Unavailable(err.to_string())
    }
}

/// Access to the chain node the gate drafts transactions against.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Drafts a `saveUserData` call for the caller's wallet to sign.
    async fn build_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<UnsignedTransaction, ChainError>;

    async fn gas_price(&self) -> Result<U256, ChainError>;

    /// Transactions sent by `sender` in the latest `window_blocks` blocks.
    async fn recent_sender_tx_count(
        &self,
        sender: Address,
        window_blocks: u64,
    ) -> Result<usize, ChainError>;

    async fn block_gas_limit(&self) -> Result<U256, ChainError>;

    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    async fn is_connected(&self) -> bool;
}

/// ABI binding for the user-data storage contract.
#[derive(Debug, Clone)]
pub struct UserDataContract {
    pub address: Address,
    pub chain_id: u64,
    pub gas_limit: U256,
    save_user_data: Function,
}

impl UserDataContract {
    pub fn new(address: Address, chain_id: u64, gas_limit: u64) -> Result<Self, ChainError> {
        let abi = parse_abi(&[SAVE_USER_DATA]).map_err(|e| ChainError::Setup(e.to_string()))?;
        let save_user_data = abi
            .function("saveUserData")
            .map_err(|e| ChainError::Setup(e.to_string()))?
            .clone();
        Ok(Self {
            address,
            chain_id,
            gas_limit: U256::from(gas_limit),
            save_user_data,
        })
    }

    pub fn encode_save_user_data(&self, request: &TransactionRequest) -> Result<Bytes, ChainError> {
        let tokens = [
            Token::String(request.name.clone()),
            Token::String(request.address.clone()),
            Token::String(request.location.clone()),
        ];
        self.save_user_data
            .encode_input(&tokens)
            .map(Bytes::from)
            .map_err(|e| ChainError::Encoding(e.to_string()))
    }

    /// Unsigned call with the configured gas limit and the given gas price.
    pub fn draft(
        &self,
        request: &TransactionRequest,
        gas_price: U256,
    ) -> Result<UnsignedTransaction, ChainError> {
        Ok(UnsignedTransaction {
            to: self.address,
            data: self.encode_save_user_data(request)?,
            gas: self.gas_limit,
            gas_price,
            chain_id: self.chain_id,
        })
    }
}

#[derive(Clone)]
pub struct EthClient {
    provider: Provider<Http>,
    contract: UserDataContract,
}

impl EthClient {
    pub fn new(rpc_url: &str, contract: UserDataContract) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| ChainError::Setup(format!("failed to build reqwest client: {e}")))?;
        let url = Url::parse(rpc_url)
            .map_err(|e| ChainError::Setup(format!("invalid ETH_RPC_URL: {e}")))?;
        let transport = Http::new_with_client(url, client);
        let provider = Provider::new(transport);
        Ok(Self { provider, contract })
    }

    async fn fetch_recent_blocks(&self, count: u64) -> Result<Vec<Block<Transaction>>, ChainError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let latest = self.provider.get_block_number().await?.as_u64();
        let start = latest.saturating_sub(count - 1);

        let fetches = (start..=latest).map(|num| {
            let provider = &self.provider;
            async move {
                provider
                    .get_block_with_txs(BlockId::Number(num.into()))
                    .await
            }
        });
        let blocks = try_join_all(fetches).await?;
        Ok(blocks.into_iter().flatten().collect())
    }
}

#[async_trait]
impl ChainClient for EthClient {
    async fn build_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<UnsignedTransaction, ChainError> {
        let gas_price = self.gas_price().await?;
        self.contract.draft(request, gas_price)
    }

    async fn gas_price(&self) -> Result<U256, ChainError> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn recent_sender_tx_count(
        &self,
        sender: Address,
        window_blocks: u64,
    ) -> Result<usize, ChainError> {
        let blocks = self.fetch_recent_blocks(window_blocks).await?;
        Ok(count_sender_transactions(&blocks, sender))
    }

    async fn block_gas_limit(&self) -> Result<U256, ChainError> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await?
            .ok_or_else(|| ChainError::Unavailable("latest block not found".to_string()))?;
        Ok(block.gas_limit)
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    async fn is_connected(&self) -> bool {
        match self.provider.get_block_number().await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("chain probe failed: {}", err);
                false
            }
        }
    }
}

fn count_sender_transactions(blocks: &[Block<Transaction>], sender: Address) -> usize {
    blocks
        .iter()
        .flat_map(|block| block.transactions.iter())
        .filter(|tx| tx.from == sender)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::utils::id;

    fn contract() -> UserDataContract {
        UserDataContract::new(Address::from_low_u64_be(0xc0ffee), 1337, 2_000_000).unwrap()
    }

    fn request() -> TransactionRequest {
        TransactionRequest {
            name: "John Doe".to_string(),
            address: "123 Main St".to_string(),
            location: "New York".to_string(),
            from: None,
        }
    }

    #[test]
    fn calldata_starts_with_save_user_data_selector() {
        let data = contract().encode_save_user_data(&request()).unwrap();
        assert_eq!(&data[..4], &id("saveUserData(string,string,string)")[..]);
    }

    #[test]
    fn calldata_carries_the_three_fields() {
        let contract = contract();
        let data = contract.encode_save_user_data(&request()).unwrap();
        let tokens = contract.save_user_data.decode_input(&data[4..]).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::String("John Doe".to_string()),
                Token::String("123 Main St".to_string()),
                Token::String("New York".to_string()),
            ]
        );
    }

    #[test]
    fn draft_uses_configured_gas_and_chain() {
        let tx = contract().draft(&request(), U256::from(7u64)).unwrap();
        assert_eq!(tx.to, Address::from_low_u64_be(0xc0ffee));
        assert_eq!(tx.gas, U256::from(2_000_000u64));
        assert_eq!(tx.gas_price, U256::from(7u64));
        assert_eq!(tx.chain_id, 1337);
    }

    #[test]
    fn counts_only_matching_senders() {
        let sender = Address::from_low_u64_be(1);
        let other = Address::from_low_u64_be(2);
        let tx_from = |from| {
            let mut tx = Transaction::default();
            tx.from = from;
            tx
        };

        let mut first = Block::<Transaction>::default();
        first.transactions = vec![tx_from(sender), tx_from(other), tx_from(sender)];
        let mut second = Block::<Transaction>::default();
        second.transactions = vec![tx_from(sender)];

        assert_eq!(count_sender_transactions(&[first, second], sender), 3);
        assert_eq!(count_sender_transactions(&[], sender), 0);
    }

    #[test]
    fn rejects_invalid_rpc_url() {
        assert!(matches!(
            EthClient::new("not a url", contract()),
            Err(ChainError::Setup(_))
        ));
    }
}
