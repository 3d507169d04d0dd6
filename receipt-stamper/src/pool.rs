use bip32::{ChildNumber, DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use secp256k1::SecretKey;

use crate::{
    configuration::{IndexRange, KeySettings},
    error::StampError,
    keys::KeyEntry,
    stacks::{Account, Network, PrivateKey, StacksAddress},
};

/// Stacks wallets derive account `i` at `m/44'/5757'/0'/0/i`.
const STACKS_ACCOUNT_PARENT: &str = "m/44'/5757'/0'/0";

#[derive(Debug, Clone, Default)]
pub struct Pools {
    pub senders: Vec<Account>,
    pub recipients: Vec<StacksAddress>,
}

/// Expands key entries into senders and recipients. Raw keys only ever
/// send; each mnemonic contributes its sender range to the senders and its
/// recipient range to the recipients.
#[tracing::instrument(name = "Building key pools", skip(entries, settings))]
pub async fn build_pools(
    entries: &[KeyEntry],
    settings: &KeySettings,
    network: Network,
) -> Result<Pools, StampError> {
    let mut pools = Pools::default();

    for (line, entry) in entries.iter().enumerate() {
        match entry {
            KeyEntry::RawKey { value } => {
                let key = PrivateKey::from_hex(value).map_err(|e| {
                    StampError::Config(format!("key entry {} is not a valid private key: {}", line + 1, e))
                })?;
                pools.senders.push(Account::new(key, network));
            }
            KeyEntry::Mnemonic { phrase } => {
                let phrase = phrase.clone();
                let password = settings.password.clone();
                let senders = settings.sender_range;
                let recipients = settings.recipient_range;

                // PBKDF2 and EC multiplications; keep them off the async workers.
                let derived = tokio::task::spawn_blocking(move || {
                    derive_accounts(&phrase, &password, senders, recipients, network)
                })
                .await
                .map_err(|e| StampError::Config(format!("key derivation task failed: {}", e)))?
                .map_err(|e| {
                    StampError::Config(format!("key entry {} is not a valid mnemonic: {}", line + 1, e))
                })?;

                pools.senders.extend(derived.senders);
                pools.recipients.extend(derived.recipients);
            }
        }
    }

    tracing::info!(
        senders = pools.senders.len(),
        recipients = pools.recipients.len(),
        "Key pools ready"
    );
    Ok(pools)
}

/// Derives the sender accounts and recipient addresses of one mnemonic.
/// `password` is the BIP-39 passphrase; the empty default yields the same
/// accounts as Stacks wallets.
pub fn derive_accounts(
    phrase: &str,
    password: &str,
    senders: IndexRange,
    recipients: IndexRange,
    network: Network,
) -> Result<Pools, DerivationError> {
    let mnemonic = Mnemonic::parse_in(Language::English, phrase)
        .map_err(|e| DerivationError(e.to_string()))?;
    let seed = mnemonic.to_seed(password);

    let parent_path: DerivationPath = STACKS_ACCOUNT_PARENT
        .parse()
        .map_err(|e: bip32::Error| DerivationError(e.to_string()))?;
    let parent = XPrv::derive_from_path(seed, &parent_path)
        .map_err(|e| DerivationError(e.to_string()))?;

    let derive = |index: u32| -> Result<Account, DerivationError> {
        let child = ChildNumber::new(index, false)
            .and_then(|number| parent.derive_child(number))
            .map_err(|e| DerivationError(e.to_string()))?;
        let secret = SecretKey::from_slice(&child.private_key().to_bytes())
            .map_err(|e| DerivationError(e.to_string()))?;
        Ok(Account::new(PrivateKey::new(secret, true), network))
    };

    let senders = senders.iter().map(&derive).collect::<Result<Vec<_>, _>>()?;
    let recipients = recipients
        .iter()
        .map(|index| derive(index).map(|account| account.address))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Pools { senders, recipients })
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DerivationError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const RAW_KEY: &str = "edf9aee84d9b7abc145504dde6726c64f369d37ee34ded868fabd876c26570bc01";

    fn settings() -> KeySettings {
        KeySettings {
            file: PathBuf::from("keys.txt"),
            private_key: None,
            password: String::new(),
            sender_range: IndexRange { start: 0, end: 3 },
            recipient_range: IndexRange { start: 0, end: 47 },
        }
    }

    #[test]
    fn derivation_is_deterministic_and_ranges_overlap() {
        let first = derive_accounts(
            PHRASE,
            "",
            IndexRange { start: 0, end: 3 },
            IndexRange { start: 0, end: 47 },
            Network::Mainnet,
        )
        .unwrap();
        let second = derive_accounts(
            PHRASE,
            "",
            IndexRange { start: 0, end: 3 },
            IndexRange { start: 0, end: 47 },
            Network::Mainnet,
        )
        .unwrap();

        assert_eq!(first.senders.len(), 4);
        assert_eq!(first.recipients.len(), 48);
        assert_eq!(first.recipients, second.recipients);
        for (sender, recipient) in first.senders.iter().zip(&first.recipients) {
            assert_eq!(&sender.address, recipient);
        }
        assert!(first.recipients[0].to_string().starts_with("SP"));
        assert_ne!(first.recipients[0], first.recipients[1]);
    }

    #[test]
    fn passphrase_changes_the_accounts() {
        let range = IndexRange { start: 0, end: 0 };

        let plain = derive_accounts(PHRASE, "", range, range, Network::Testnet).unwrap();
        let protected = derive_accounts(PHRASE, "hunter2", range, range, Network::Testnet).unwrap();

        assert_ne!(plain.recipients, protected.recipients);
    }

    #[test]
    fn invalid_mnemonic_is_rejected() {
        let range = IndexRange { start: 0, end: 0 };

        let result = derive_accounts(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon",
            "",
            range,
            range,
            Network::Mainnet,
        );

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn raw_keys_only_send() {
        let entries = vec![KeyEntry::RawKey {
            value: RAW_KEY.to_string(),
        }];

        let pools = build_pools(&entries, &settings(), Network::Mainnet).await.unwrap();

        assert_eq!(pools.senders.len(), 1);
        assert!(pools.recipients.is_empty());
    }

    #[tokio::test]
    async fn mnemonics_fill_both_pools() {
        let entries = vec![
            KeyEntry::RawKey {
                value: RAW_KEY.to_string(),
            },
            KeyEntry::Mnemonic {
                phrase: PHRASE.to_string(),
            },
        ];

        let pools = build_pools(&entries, &settings(), Network::Mainnet).await.unwrap();

        assert_eq!(pools.senders.len(), 5);
        assert_eq!(pools.recipients.len(), 48);
    }

    #[tokio::test]
    async fn bad_raw_key_is_a_config_error() {
        let entries = vec![KeyEntry::RawKey {
            value: "not-a-key".to_string(),
        }];

        let result = build_pools(&entries, &settings(), Network::Mainnet).await;

        assert!(matches!(result, Err(StampError::Config(_))));
    }
}
