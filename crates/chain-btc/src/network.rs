use serde::{Deserialize, Serialize};

/// Supported Bitcoin networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcNetwork {
    Mainnet,
    Testnet,
}

/// Per-network encoding prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    /// Version byte of Base58Check P2PKH addresses.
    pub p2pkh_prefix: u8,
    /// Version byte of WIF private keys.
    pub wif_prefix: u8,
    /// Human-readable part of bech32 segwit addresses.
    pub bech32_hrp: &'static str,
    /// BIP44 coin type.
    pub coin_type: u32,
}

const MAINNET_PARAMS: NetworkParams = NetworkParams {
    p2pkh_prefix: 0x00,
    wif_prefix: 0x80,
    bech32_hrp: "bc",
    coin_type: 0,
};

const TESTNET_PARAMS: NetworkParams = NetworkParams {
    p2pkh_prefix: 0x6f,
    wif_prefix: 0xef,
    bech32_hrp: "tb",
    coin_type: 1,
};

impl BtcNetwork {
    pub fn params(self) -> &'static NetworkParams {
        match self {
            BtcNetwork::Mainnet => &MAINNET_PARAMS,
            BtcNetwork::Testnet => &TESTNET_PARAMS,
        }
    }

    /// Find the network whose P2PKH version byte is `prefix`.
    pub fn from_p2pkh_prefix(prefix: u8) -> Option<Self> {
        [BtcNetwork::Mainnet, BtcNetwork::Testnet]
            .into_iter()
            .find(|n| n.params().p2pkh_prefix == prefix)
    }

    /// Find the network whose WIF version byte is `prefix`.
    pub fn from_wif_prefix(prefix: u8) -> Option<Self> {
        [BtcNetwork::Mainnet, BtcNetwork::Testnet]
            .into_iter()
            .find(|n| n.params().wif_prefix == prefix)
    }

    /// Find the network whose bech32 HRP is `hrp` (case-insensitive).
    pub fn from_hrp(hrp: &str) -> Option<Self> {
        [BtcNetwork::Mainnet, BtcNetwork::Testnet]
            .into_iter()
            .find(|n| n.params().bech32_hrp.eq_ignore_ascii_case(hrp))
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
        }
    }
}
