use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The strength of a proof, ordered from the cheapest to the most expensive one.
///
/// The derived [`Ord`] follows declaration order, which is what submitter selection relies on:
/// a batch requiring tier `T` can be proven by any tier `>= T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofTier {
    /// Optimistic proof, contestable during the cooldown window.
    Optimistic,
    /// Trusted execution environment proof (SGX/TDX).
    Tee,
    /// Zero-knowledge proof.
    Zk,
    /// Combined zero-knowledge and TEE proof.
    ZkTee,
}

impl ProofTier {
    /// All tiers in ascending order.
    pub const ALL: [Self; 4] = [Self::Optimistic, Self::Tee, Self::Zk, Self::ZkTee];

    /// Returns the protocol tier ID.
    pub const fn id(&self) -> u16 {
        match self {
            Self::Optimistic => 100,
            Self::Tee => 200,
            Self::Zk => 290,
            Self::ZkTee => 300,
        }
    }

    /// Returns the tier matching the given protocol tier ID, if any.
    pub const fn from_id(id: u16) -> Option<Self> {
        match id {
            100 => Some(Self::Optimistic),
            200 => Some(Self::Tee),
            290 => Some(Self::Zk),
            300 => Some(Self::ZkTee),
            _ => None,
        }
    }

    /// Returns the proof type string understood by the proof service.
    pub const fn proof_type(&self) -> &'static str {
        match self {
            Self::Optimistic => "native",
            Self::Tee => "sgx",
            Self::Zk => "sp1",
            Self::ZkTee => "zk_tee",
        }
    }

    /// Returns the next stronger tier, or `None` if this is already the strongest one.
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Optimistic => Some(Self::Tee),
            Self::Tee => Some(Self::Zk),
            Self::Zk => Some(Self::ZkTee),
            Self::ZkTee => None,
        }
    }
}

impl fmt::Display for ProofTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Optimistic => "optimistic",
            Self::Tee => "tee",
            Self::Zk => "zk",
            Self::ZkTee => "zk_tee",
        };
        f.write_str(name)
    }
}

/// Error returned when parsing an unknown tier name.
#[derive(Debug, thiserror::Error)]
#[error("unknown proof tier: {0}")]
pub struct UnknownTierError(String);

impl FromStr for ProofTier {
    type Err = UnknownTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "optimistic" | "native" => Ok(Self::Optimistic),
            "tee" | "sgx" => Ok(Self::Tee),
            "zk" | "sp1" | "risc0" => Ok(Self::Zk),
            "zk_tee" | "zktee" => Ok(Self::ZkTee),
            other => Err(UnknownTierError(other.to_owned())),
        }
    }
}
