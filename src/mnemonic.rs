//! Mnemonic operations - seed derivation, generation, setup picker.
//!
//! Thin wrappers over bip39. The seed is returned zeroizing so it does
//! not outlive the backend handoff in memory.

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

/// Words in a wallet phrase (16 bytes of entropy).
pub const PHRASE_WORD_COUNT: usize = 12;

/// Derive the 64-byte BIP39 seed from a phrase (empty passphrase).
pub fn seed(phrase: &str) -> WalletResult<Zeroizing<[u8; 64]>> {
    let mnemonic =
        Mnemonic::parse_normalized(phrase).map_err(|e| WalletError::Mnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_seed("")))
}

/// The ordered English word list.
pub fn word_list() -> &'static [&'static str] {
    Language::English.word_list()
}

/// Generate a fresh phrase of `word_count` words from OS entropy.
pub fn generate(word_count: usize) -> WalletResult<String> {
    if !matches!(word_count, 12 | 15 | 18 | 21 | 24) {
        return Err(WalletError::Mnemonic(format!(
            "unsupported word count: {word_count}"
        )));
    }
    let entropy_len = word_count / 3 * 4;
    let mut entropy = Zeroizing::new([0u8; 32]);
    rand::thread_rng().fill_bytes(&mut entropy[..entropy_len]);
    let mnemonic = Mnemonic::from_entropy(&entropy[..entropy_len])
        .map_err(|e| WalletError::Mnemonic(e.to_string()))?;
    Ok(mnemonic.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PickerState {
    #[default]
    Pending,
    Complete,
    Error,
}

/// Setup-flow word picker: the user assembles a phrase word by word
/// from the BIP39 list, or generates one.
#[derive(Debug, Default)]
pub struct WordPicker {
    selected: Vec<String>,
    state: PickerState,
}

impl WordPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the picker from a stored phrase.
    pub fn restore(phrase: &str) -> Self {
        let selected: Vec<String> = phrase.split_whitespace().map(str::to_string).collect();
        let mut picker = Self { selected, state: PickerState::Pending };
        picker.update_state();
        picker
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn state(&self) -> PickerState {
        self.state
    }

    pub fn is_full(&self) -> bool {
        self.selected.len() == PHRASE_WORD_COUNT
    }

    /// Words still offered for selection.
    pub fn available(&self) -> Vec<&'static str> {
        if self.selected.is_empty() {
            return word_list().to_vec();
        }
        word_list()
            .iter()
            .copied()
            .filter(|w| !self.selected.iter().any(|s| s == w))
            .collect()
    }

    /// Select a word, or deselect it if already chosen. Unknown words
    /// and selections past a full phrase are ignored.
    pub fn toggle(&mut self, word: &str) {
        if let Some(index) = self.selected.iter().position(|s| s == word) {
            self.selected.remove(index);
        } else if word_list().contains(&word) && !self.is_full() {
            self.selected.push(word.to_string());
        }
        self.update_state();
    }

    /// Replace the selection with a freshly generated phrase.
    pub fn regenerate(&mut self) -> WalletResult<()> {
        let phrase = generate(PHRASE_WORD_COUNT)?;
        self.selected = phrase.split_whitespace().map(str::to_string).collect();
        self.update_state();
        Ok(())
    }

    /// Confirm the selection. A full phrase completes the picker and is
    /// returned joined; anything else flags the error state.
    pub fn confirm(&mut self) -> Option<String> {
        if self.is_full() {
            self.state = PickerState::Complete;
            Some(self.selected.join(" "))
        } else {
            self.state = PickerState::Error;
            None
        }
    }

    fn update_state(&mut self) {
        self.state = if self.is_full() { PickerState::Complete } else { PickerState::Pending };
    }
}
