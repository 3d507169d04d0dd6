use std::{path::PathBuf, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{retry::RetryPolicy, stacks::Network};

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub network: NetworkSettings,
    #[serde(default)]
    pub keys: KeySettings,
    #[serde(default)]
    pub batch: BatchSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NetworkSettings {
    #[serde(default)]
    pub network: Network,
    /// Node / API base URL; the public Hiro API of `network` when unset.
    pub api_url: Option<String>,
    pub contract_address: String,
    pub contract_name: String,
    /// Fixed fee in micro-STX instead of the node's estimate.
    pub fee: Option<u64>,
}

impl NetworkSettings {
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_api_url())
    }
}

/// Inclusive range of wallet account indices.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub start: u32,
    pub end: u32,
}

impl IndexRange {
    pub fn iter(self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct KeySettings {
    pub file: PathBuf,
    /// Takes precedence over `file`.
    pub private_key: Option<String>,
    /// BIP-39 passphrase applied when deriving from mnemonics.
    pub password: String,
    pub sender_range: IndexRange,
    pub recipient_range: IndexRange,
}

impl Default for KeySettings {
    fn default() -> Self {
        KeySettings {
            file: PathBuf::from("keys.txt"),
            private_key: None,
            password: String::new(),
            sender_range: IndexRange { start: 0, end: 3 },
            recipient_range: IndexRange { start: 0, end: 47 },
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BatchSettings {
    pub content_file: PathBuf,
    pub progress_file: PathBuf,
    pub pid_file: PathBuf,
    pub interval_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub build_retries: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            content_file: PathBuf::from("content.json"),
            progress_file: PathBuf::from("progress.json"),
            pid_file: PathBuf::from("stamp-batch.pid"),
            interval_secs: 47,
            max_retries: 3,
            retry_delay_secs: 5,
            build_retries: 3,
        }
    }
}

impl BatchSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Outer policy: whole stamp attempts for one content item.
    pub fn stamp_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }

    /// Inner policy: transaction construction while rate limited.
    pub fn build_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.build_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

/// Reads `<name>.yaml` (or any format `config` recognizes by extension),
/// then applies `APP_`-prefixed environment overrides such as
/// `APP_KEYS__PRIVATE_KEY` or `APP_BATCH__INTERVAL_SECS`.
pub fn get_configuration(name: &str) -> Result<Settings, config::ConfigError> {
    let settings = Config::builder()
        .add_source(File::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
