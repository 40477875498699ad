//! Wallet configuration - passed from higher layers

use bitcoin::FeeRate;

/// Fee rate applied to every send, in sat/vB. Fixed process-wide but
/// threaded through the engine as a parameter.
pub const DEFAULT_FEE_RATE_SAT_VB: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    Bitcoin,
    Testnet,
    #[default]
    Signet,
    Regtest,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Bitcoin => "bitcoin",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "mainnet" => Some(Network::Bitcoin),
            "testnet" => Some(Network::Testnet),
            "signet" => Some(Network::Signet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    pub fn to_bitcoin(&self) -> bitcoin::Network {
        match self {
            Network::Bitcoin => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Signet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Wallet configuration. Higher layers construct this.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network: Network,
    pub electrum_url: Option<String>,
    pub data_dir: Option<std::path::PathBuf>,
    pub fee_rate_sat_vb: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            electrum_url: None,
            data_dir: None,
            fee_rate_sat_vb: DEFAULT_FEE_RATE_SAT_VB,
        }
    }
}

impl WalletConfig {
    pub fn mainnet() -> Self {
        Self { network: Network::Bitcoin, ..Default::default() }
    }
    pub fn testnet() -> Self {
        Self { network: Network::Testnet, ..Default::default() }
    }
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }
    pub fn with_electrum(mut self, url: impl Into<String>) -> Self {
        self.electrum_url = Some(url.into());
        self
    }
    pub fn with_data_dir(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }
    pub fn with_fee_rate(mut self, sat_per_vb: u64) -> Self {
        self.fee_rate_sat_vb = sat_per_vb.max(1);
        self
    }

    pub fn fee_rate(&self) -> FeeRate {
        FeeRate::from_sat_per_vb(self.fee_rate_sat_vb).unwrap_or(FeeRate::BROADCAST_MIN)
    }
}
