//! Preferences store - the small amount of state the shell persists.
//!
//! One JSON document: mnemonic phrase, login flag, last transaction.
//! The phrase is stored in plaintext, as the app this replaces did.
//! That is a known weakness of the surrounding shell, not a choice of
//! the wallet core.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::send::TransactionRecord;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsData {
    mnemonic: Option<String>,
    logged_in: bool,
    last_transaction: Option<TransactionRecord>,
}

#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    data: SettingsData,
}

impl Settings {
    pub fn default_path(app: &str) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(app)
            .join("settings.json")
    }

    /// Load from `path`, or start empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> WalletResult<Self> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| WalletError::Store(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SettingsData::default(),
            Err(e) => return Err(WalletError::Store(e.to_string())),
        };
        Ok(Self { path, data })
    }

    pub fn mnemonic(&self) -> Option<&str> {
        self.data.mnemonic.as_deref()
    }

    pub fn set_mnemonic(&mut self, phrase: Option<String>) -> WalletResult<()> {
        self.data.mnemonic = phrase;
        self.save()
    }

    pub fn logged_in(&self) -> bool {
        self.data.logged_in
    }

    pub fn set_logged_in(&mut self, value: bool) -> WalletResult<()> {
        self.data.logged_in = value;
        self.save()
    }

    pub fn last_transaction(&self) -> Option<&TransactionRecord> {
        self.data.last_transaction.as_ref()
    }

    pub fn set_last_transaction(&mut self, record: Option<TransactionRecord>) -> WalletResult<()> {
        self.data.last_transaction = record;
        self.save()
    }

    fn save(&self) -> WalletResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WalletError::Store(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(&self.data)
            .map_err(|e| WalletError::Store(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| WalletError::Store(e.to_string()))
    }
}
