//! Classification-gated drafting of contract calls.
//!
//! Each non-empty field is classified in order; the first attack above the
//! threshold rejects the whole request. Only a fully clean request reaches
//! the chain client.

use std::str::FromStr;
use std::sync::Arc;

use ethers_core::types::{Address, U256};

use crate::chain::{ChainClient, ChainError};
use crate::classifier::TextClassifier;
use crate::fraud::{
    self, FraudIndicators, FraudPolicy, FraudReport, FraudThresholds, TransactionProbe,
};
use crate::models::{FormField, TransactionRequest, UnsignedTransaction};
use crate::stats::GateStats;

pub const DEFAULT_THRESHOLD: f64 = 0.75;

#[derive(thiserror::Error, Debug)]
pub enum Rejection {
    #[error("{field} flagged as attack (confidence {confidence:.3})")]
    Blocked { field: FormField, confidence: f64 },
    #[error("transaction flagged by fraud heuristics: {0:?}")]
    FraudSuspected(FraudIndicators),
    #[error("invalid sender address {0:?}")]
    InvalidSender(String),
    #[error("classifier not loaded")]
    ClassifierUnavailable,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Successful pass through the gate.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub transaction: UnsignedTransaction,
    /// All-clear when the request named no sender.
    pub fraud: FraudReport,
}

pub struct RequestGate {
    classifier: Arc<dyn TextClassifier>,
    chain: Arc<dyn ChainClient>,
    threshold: f64,
    fraud_policy: FraudPolicy,
    fraud_thresholds: FraudThresholds,
    stats: Arc<GateStats>,
}

impl RequestGate {
    pub fn new(classifier: Arc<dyn TextClassifier>, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            classifier,
            chain,
            threshold: DEFAULT_THRESHOLD,
            fraud_policy: FraudPolicy::default(),
            fraud_thresholds: FraudThresholds::default(),
            stats: Arc::new(GateStats::new()),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_fraud_policy(mut self, policy: FraudPolicy) -> Self {
        self.fraud_policy = policy;
        self
    }

    pub fn classifier(&self) -> &dyn TextClassifier {
        self.classifier.as_ref()
    }

    pub fn chain(&self) -> &dyn ChainClient {
        self.chain.as_ref()
    }

    pub fn stats(&self) -> &GateStats {
        &self.stats
    }

    pub fn fraud_policy(&self) -> FraudPolicy {
        self.fraud_policy
    }

    pub async fn handle(&self, request: &TransactionRequest) -> Result<Accepted, Rejection> {
        if !self.classifier.is_ready() {
            return Err(Rejection::ClassifierUnavailable);
        }

        if let Err(rejection) = self.screen(request) {
            self.stats.inc_requests_blocked();
            return Err(rejection);
        }

        let sender = parse_sender(request.from.as_deref())?;

        let transaction = match self.chain.build_transaction(request).await {
            Ok(tx) => tx,
            Err(err) => {
                self.stats.inc_chain_failures();
                return Err(err.into());
            }
        };

        let fraud = match sender {
            Some(from) => {
                let probe = TransactionProbe {
                    from: Some(from),
                    gas: transaction.gas,
                    gas_price: transaction.gas_price,
                    value: U256::zero(),
                };
                fraud::assess(self.chain.as_ref(), &probe, &self.fraud_thresholds).await
            }
            None => FraudReport::default(),
        };

        if fraud.indicators.any() {
            self.stats.inc_fraud_flags();
            if self.fraud_policy == FraudPolicy::Enforce {
                self.stats.inc_requests_blocked();
                return Err(Rejection::FraudSuspected(fraud.indicators));
            }
        }

        self.stats.inc_transactions_drafted();
        Ok(Accepted { transaction, fraud })
    }

    /// Classifies fields in order, stopping at the first one over threshold.
    fn screen(&self, request: &TransactionRequest) -> Result<(), Rejection> {
        for (field, value) in request.fields() {
            if value.is_empty() {
                continue;
            }
            let result = self.classifier.classify(value);
            self.stats.inc_fields_classified();
            tracing::debug!(
                field = field.as_str(),
                label = result.label.as_str(),
                confidence = result.confidence,
                "classified field"
            );
            if result.is_attack_above(self.threshold) {
                return Err(Rejection::Blocked {
                    field,
                    confidence: result.confidence,
                });
            }
        }
        Ok(())
    }
}

fn parse_sender(raw: Option<&str>) -> Result<Option<Address>, Rejection> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Address::from_str(s)
            .map(Some)
            .map_err(|_| Rejection::InvalidSender(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::UserDataContract;
    use crate::classifier::{ClassificationResult, Label};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Flags any text containing `<`; records what it was asked.
    struct AngleBracketClassifier {
        confidence: f64,
        seen: Mutex<Vec<String>>,
    }

    impl AngleBracketClassifier {
        fn new(confidence: f64) -> Self {
            Self {
                confidence,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextClassifier for AngleBracketClassifier {
        fn classify(&self, text: &str) -> ClassificationResult {
            self.seen.lock().unwrap().push(text.to_string());
            let label = if text.contains('<') {
                Label::Attack
            } else {
                Label::Normal
            };
            ClassificationResult {
                label,
                confidence: self.confidence,
            }
        }
    }

    struct StubChain {
        contract: UserDataContract,
        gas_price: U256,
        recent_txs: usize,
        fail: bool,
    }

    impl StubChain {
        fn new() -> Self {
            Self {
                contract: UserDataContract::new(Address::from_low_u64_be(0xfeed), 1337, 2_000_000)
                    .unwrap(),
                gas_price: U256::from(1_000u64),
                recent_txs: 0,
                fail: false,
            }
        }

        fn check(&self) -> Result<(), ChainError> {
            if self.fail {
                Err(ChainError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ChainClient for StubChain {
        async fn build_transaction(
            &self,
            request: &TransactionRequest,
        ) -> Result<UnsignedTransaction, ChainError> {
            self.check()?;
            self.contract.draft(request, self.gas_price)
        }

        async fn gas_price(&self) -> Result<U256, ChainError> {
            self.check().map(|_| self.gas_price)
        }

        async fn recent_sender_tx_count(&self, _: Address, _: u64) -> Result<usize, ChainError> {
            self.check().map(|_| self.recent_txs)
        }

        async fn block_gas_limit(&self) -> Result<U256, ChainError> {
            self.check().map(|_| U256::from(30_000_000u64))
        }

        async fn balance(&self, _: Address) -> Result<U256, ChainError> {
            self.check().map(|_| U256::exp10(18))
        }

        async fn is_connected(&self) -> bool {
            !self.fail
        }
    }

    fn request(name: &str, address: &str, location: &str) -> TransactionRequest {
        TransactionRequest {
            name: name.to_string(),
            address: address.to_string(),
            location: location.to_string(),
            from: None,
        }
    }

    fn gate(classifier: Arc<AngleBracketClassifier>, chain: StubChain) -> RequestGate {
        RequestGate::new(classifier, Arc::new(chain))
    }

    #[tokio::test]
    async fn clean_request_is_drafted_to_the_contract() {
        let gate = gate(Arc::new(AngleBracketClassifier::new(0.99)), StubChain::new());
        let accepted = gate
            .handle(&request("John Doe", "123 Main St", "New York"))
            .await
            .unwrap();
        assert_eq!(accepted.transaction.to, Address::from_low_u64_be(0xfeed));
        assert_eq!(gate.stats().snapshot().transactions_drafted, 1);
        assert_eq!(gate.stats().snapshot().fields_classified, 3);
    }

    #[tokio::test]
    async fn first_flagged_field_short_circuits() {
        let classifier = Arc::new(AngleBracketClassifier::new(0.9));
        let gate = gate(classifier.clone(), StubChain::new());
        let err = gate
            .handle(&request("Ann", "<img src=x>", "<script>"))
            .await
            .unwrap_err();
        match err {
            Rejection::Blocked { field, confidence } => {
                assert_eq!(field, FormField::Address);
                assert_eq!(confidence, 0.9);
            }
            other => panic!("unexpected rejection {other:?}"),
        }
        assert_eq!(classifier.seen.lock().unwrap().len(), 2);
        assert_eq!(gate.stats().snapshot().transactions_drafted, 0);
    }

    #[tokio::test]
    async fn empty_fields_are_not_classified() {
        let classifier = Arc::new(AngleBracketClassifier::new(0.9));
        let gate = gate(classifier.clone(), StubChain::new());
        gate.handle(&request("", "", "Paris")).await.unwrap();
        assert_eq!(*classifier.seen.lock().unwrap(), vec!["Paris".to_string()]);
    }

    #[tokio::test]
    async fn attack_at_threshold_passes() {
        let gate = gate(Arc::new(AngleBracketClassifier::new(0.75)), StubChain::new());
        assert!(gate.handle(&request("<b>", "", "")).await.is_ok());

        let strict = RequestGate::new(
            Arc::new(AngleBracketClassifier::new(0.75)),
            Arc::new(StubChain::new()),
        )
        .with_threshold(0.5);
        assert!(matches!(
            strict.handle(&request("<b>", "", "")).await,
            Err(Rejection::Blocked { .. })
        ));
    }

    #[tokio::test]
    async fn chain_failure_surfaces_without_retry() {
        let mut chain = StubChain::new();
        chain.fail = true;
        let gate = gate(Arc::new(AngleBracketClassifier::new(0.1)), chain);
        let err = gate.handle(&request("Ann", "", "")).await.unwrap_err();
        assert!(matches!(err, Rejection::Chain(ChainError::Unavailable(_))));
        assert_eq!(gate.stats().snapshot().chain_failures, 1);
    }

    #[tokio::test]
    async fn fraud_flags_are_advisory_unless_enforced() {
        let sender = "0x0000000000000000000000000000000000000001";
        let mut req = request("Ann", "", "");
        req.from = Some(sender.to_string());

        let mut busy = StubChain::new();
        busy.recent_txs = 25;
        let advisory = gate(Arc::new(AngleBracketClassifier::new(0.1)), busy);
        let accepted = advisory.handle(&req).await.unwrap();
        assert!(accepted.fraud.indicators.rapid_transactions);
        assert_eq!(advisory.stats().snapshot().fraud_flags, 1);

        let mut busy = StubChain::new();
        busy.recent_txs = 25;
        let enforcing = gate(Arc::new(AngleBracketClassifier::new(0.1)), busy)
            .with_fraud_policy(FraudPolicy::Enforce);
        assert!(matches!(
            enforcing.handle(&req).await,
            Err(Rejection::FraudSuspected(FraudIndicators {
                rapid_transactions: true,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn malformed_sender_is_rejected_after_screening() {
        let classifier = Arc::new(AngleBracketClassifier::new(0.1));
        let gate = gate(classifier.clone(), StubChain::new());
        let mut req = request("Ann", "", "");
        req.from = Some("not-an-address".to_string());
        assert!(matches!(
            gate.handle(&req).await,
            Err(Rejection::InvalidSender(_))
        ));
        assert_eq!(*classifier.seen.lock().unwrap(), vec!["Ann".to_string()]);
        assert_eq!(gate.stats().snapshot().transactions_drafted, 0);
    }

    #[tokio::test]
    async fn attack_wins_over_malformed_sender() {
        let gate = gate(Arc::new(AngleBracketClassifier::new(0.9)), StubChain::new());
        let mut req = request("<script>alert('xss')</script>", "", "");
        req.from = Some("bogus".to_string());
        match gate.handle(&req).await {
            Err(Rejection::Blocked { field, .. }) => assert_eq!(field, FormField::Name),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(gate.stats().snapshot().requests_blocked, 1);
    }
}
