use std::sync::atomic::{AtomicU64, Ordering};

/// In-process counters for the request gate.
#[derive(Debug)]
pub struct GateStats {
    fields_classified: AtomicU64,
    requests_blocked: AtomicU64,
    transactions_drafted: AtomicU64,
    chain_failures: AtomicU64,
    fraud_flags: AtomicU64,
}

impl Default for GateStats {
    fn default() -> Self {
        Self::new()
    }
}

impl GateStats {
    pub const fn new() -> Self {
        Self {
            fields_classified: AtomicU64::new(0),
            requests_blocked: AtomicU64::new(0),
            transactions_drafted: AtomicU64::new(0),
            chain_failures: AtomicU64::new(0),
            fraud_flags: AtomicU64::new(0),
        }
    }

    pub fn inc_fields_classified(&self) {
        self.fields_classified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_blocked(&self) {
        self.requests_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transactions_drafted(&self) {
        self.transactions_drafted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_chain_failures(&self) {
        self.chain_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fraud_flags(&self) {
        self.fraud_flags.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            fields_classified: self.fields_classified.load(Ordering::Relaxed),
            requests_blocked: self.requests_blocked.load(Ordering::Relaxed),
            transactions_drafted: self.transactions_drafted.load(Ordering::Relaxed),
            chain_failures: self.chain_failures.load(Ordering::Relaxed),
            fraud_flags: self.fraud_flags.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GateSnapshot {
    pub fields_classified: u64,
    pub requests_blocked: u64,
    pub transactions_drafted: u64,
    pub chain_failures: u64,
    pub fraud_flags: u64,
}
