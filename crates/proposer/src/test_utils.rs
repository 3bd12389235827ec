use std::{
    collections::HashSet,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    signers::{SignerSync, local::PrivateKeySigner},
};
use alloy_primitives::{
    Address, B256, TxKind, U256,
    aliases::U96,
};
use async_trait::async_trait;
use clap::Parser;
use surge_chainio::taiko::{
    forced_inclusion::PendingForcedInclusion,
    inbox::{
        ITaikoInbox::{BaseFeeConfig, ProtocolConfig},
        TaikoInbox,
    },
};
use surge_config::Opts;
use surge_primitives::{
    batch::TxCandidate,
    pool::{TxList, TxPoolContentParams},
};
use url::Url;

use crate::{ProposerError, RuntimeConfig, cost::CostEstimator, reader::ProposerReader};

pub(crate) const GWEI: u128 = 1_000_000_000;

pub(crate) fn inbox() -> TaikoInbox {
    TaikoInbox::new(Url::parse("http://localhost:8545").unwrap(), Address::repeat_byte(0x1b))
}

pub(crate) fn signer(key: u8) -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::repeat_byte(key)).unwrap()
}

/// A signed transfer paying a 1 gwei tip, with a fee cap of `fee_cap`.
pub(crate) fn signed_transfer(signer: &PrivateKeySigner, nonce: u64, fee_cap: u128) -> TxEnvelope {
    let tx = TxEip1559 {
        chain_id: 763374,
        nonce,
        gas_limit: 21_000,
        max_fee_per_gas: fee_cap,
        max_priority_fee_per_gas: GWEI,
        to: TxKind::Call(Address::repeat_byte(0x42)),
        value: U256::from(1),
        ..Default::default()
    };
    let signature = signer.sign_hash_sync(&tx.signature_hash()).unwrap();
    tx.into_signed(signature).into()
}

pub(crate) fn transfer(nonce: u64) -> TxEnvelope {
    signed_transfer(&signer(1), nonce, 10 * GWEI)
}

pub(crate) fn runtime_config(extra: &[&str]) -> RuntimeConfig {
    let mut args = vec![
        "surge",
        "--l1.el-url",
        "http://localhost:8545",
        "--l2.el-url",
        "http://localhost:28545",
        "--l2.engine-url",
        "http://localhost:28551",
        "--l2.jwt-secret",
        "0x2aa5ef6bbd2c7c3be33fb5e0fde8c0c3f07c3e8a4ed1c2a5c7a8f8b6d3e1f0a9",
        "--operator.private-key",
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        "--contracts.taiko-inbox",
        "0x1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b",
        "--contracts.taiko-token",
        "0x0000000000000000000000000000000000000002",
        "--contracts.taiko-anchor",
        "0x0000000000000000000000000000000000000003",
        "--prover.dummy",
        "--mode",
        "proposer",
    ];
    args.extend_from_slice(extra);

    let opts = Opts::try_parse_from(args).unwrap();
    let protocol = ProtocolConfig {
        chainId: 763374,
        maxBlocksPerBatch: 4,
        blockMaxGasLimit: 240_000_000,
        livenessBondBase: U96::from(100),
        livenessBondPerBlock: U96::from(10),
        baseFeeConfig: BaseFeeConfig { sharingPctg: 75, ..Default::default() },
        ..Default::default()
    };
    RuntimeConfig { opts, protocol }
}

/// A [`ProposerReader`] over a fixed mempool, recording every pool request.
#[derive(Debug)]
pub(crate) struct MockReader {
    pub(crate) synced: AtomicBool,
    pub(crate) pool: Mutex<Vec<TxList>>,
    pub(crate) requests: Mutex<Vec<TxPoolContentParams>>,
    pub(crate) base_fee: u64,
    pub(crate) bond: Mutex<U256>,
    pub(crate) forced: Mutex<Option<PendingForcedInclusion>>,
    pub(crate) preconf_router: Mutex<Option<Address>>,
    /// Pending L1 transactions that send a bridge message.
    pub(crate) bridge_messages: Mutex<HashSet<B256>>,
}

impl Default for MockReader {
    fn default() -> Self {
        Self {
            synced: AtomicBool::new(true),
            pool: Mutex::default(),
            requests: Mutex::default(),
            base_fee: GWEI as u64,
            bond: Mutex::new(U256::MAX),
            forced: Mutex::default(),
            preconf_router: Mutex::default(),
            bridge_messages: Mutex::default(),
        }
    }
}

impl MockReader {
    pub(crate) fn with_pool(pool: Vec<TxList>) -> Self {
        Self { pool: Mutex::new(pool), ..Default::default() }
    }

    pub(crate) fn set_bond(&self, bond: U256) {
        *self.bond.lock().unwrap_or_else(PoisonError::into_inner) = bond;
    }

    pub(crate) fn requests(&self) -> Vec<TxPoolContentParams> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ProposerReader for MockReader {
    async fn is_l2_synced(&self) -> Result<bool, ProposerError> {
        Ok(self.synced.load(Ordering::Relaxed))
    }

    async fn pool_content(&self, params: TxPoolContentParams) -> Result<Vec<TxList>, ProposerError> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(params);
        Ok(self.pool.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn l2_base_fee(&self) -> Result<u64, ProposerError> {
        Ok(self.base_fee)
    }

    async fn available_bond(&self, _account: Address) -> Result<U256, ProposerError> {
        Ok(*self.bond.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn forced_inclusion(&self) -> Result<Option<PendingForcedInclusion>, ProposerError> {
        Ok(self.forced.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn parent_meta_hash(&self) -> Result<B256, ProposerError> {
        Ok(B256::repeat_byte(0x11))
    }

    async fn preconf_router(&self) -> Result<Option<Address>, ProposerError> {
        Ok(*self.preconf_router.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn is_pending_bridge_message(&self, hash: B256) -> Result<bool, ProposerError> {
        Ok(self.bridge_messages.lock().unwrap_or_else(PoisonError::into_inner).contains(&hash))
    }
}

/// A [`CostEstimator`] returning the same cost for every candidate.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedCostEstimator(pub(crate) u128);

#[async_trait]
impl CostEstimator for FixedCostEstimator {
    async fn estimate_l1_cost(
        &self,
        _candidate: &TxCandidate,
        _tx_lists: &[TxList],
    ) -> Result<u128, ProposerError> {
        Ok(self.0)
    }
}
