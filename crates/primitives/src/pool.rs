use std::fmt;

use alloy::consensus::{Transaction, TxEnvelope};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A list of L2 transactions that will end up in a single L2 block.
pub type TxList = Vec<TxEnvelope>;

/// Returns the total number of transactions in the given lists.
pub fn count_txs(tx_lists: &[TxList]) -> usize {
    tx_lists.iter().map(Vec::len).sum()
}

/// Returns the total gas limit of the transactions in the given lists.
pub fn total_gas_limit(tx_lists: &[TxList]) -> u64 {
    tx_lists.iter().flatten().map(|tx| tx.gas_limit()).sum()
}

/// A transaction list pre-built by the L2 execution client from its mempool, with estimated
/// gas used and byte length. Each list maps to one L2 block.
///
/// Reference: <https://github.com/taikoxyz/taiko-geth/blob/2448fb97a8b873c7bd7c0051cd83aaea339050e0/miner/taiko_miner.go#L11-L17>
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PreBuiltTxList {
    /// The list of transactions in the L2 block.
    pub tx_list: TxList,
    /// The estimated gas used in the L2 block.
    pub estimated_gas_used: u64,
    /// The estimated bytes length of the L2 block.
    pub bytes_length: u64,
}

impl fmt::Display for PreBuiltTxList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={}, gas={}, bytes={}",
            self.tx_list.len(),
            self.estimated_gas_used,
            self.bytes_length
        )
    }
}

/// Parameters of the `taikoAuth_txPoolContentWithMinTip` call.
///
/// Reference: <https://github.com/taikoxyz/taiko-mono/blob/c047077e6cace1505dd150c2717206b397ce58a8/packages/taiko-client/pkg/rpc/engine.go#L118-L129>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxPoolContentParams {
    /// The beneficiary address.
    pub beneficiary: Address,
    /// The L2 base fee used to filter transactions.
    pub base_fee: u64,
    /// The maximum gas limit for a block.
    pub block_max_gas_limit: u64,
    /// The maximum bytes per transaction list.
    pub max_bytes_per_tx_list: u64,
    /// Accounts whose transactions are prioritized by the execution client.
    pub local_accounts: Vec<Address>,
    /// The maximum number of transaction lists per call.
    pub max_tx_lists_per_call: u64,
    /// The minimum tip. Zero disables tip filtering.
    pub min_tip: u64,
}

impl TxPoolContentParams {
    /// Converts the parameters into positional JSON-RPC params.
    pub fn into_rpc_params(self) -> Vec<Value> {
        vec![
            json!(self.beneficiary),
            json!(self.base_fee),
            json!(self.block_max_gas_limit),
            json!(self.max_bytes_per_tx_list),
            json!(self.local_accounts),
            json!(self.max_tx_lists_per_call),
            json!(self.min_tip),
        ]
    }
}
