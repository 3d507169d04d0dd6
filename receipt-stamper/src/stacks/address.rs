use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use ripemd::Ripemd160;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::c32::{self, C32Error};

static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// c32 version of single-signature (P2PKH) addresses: `SP` / `ST`.
    pub fn address_version(self) -> u8 {
        match self {
            Network::Mainnet => 22,
            Network::Testnet => 26,
        }
    }

    pub fn transaction_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x80,
        }
    }

    pub fn chain_id(self) -> u32 {
        match self {
            Network::Mainnet => 0x0000_0001,
            Network::Testnet => 0x8000_0000,
        }
    }

    pub fn default_api_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet.hiro.so",
            Network::Testnet => "https://api.testnet.hiro.so",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 'S'")]
    MissingPrefix,
    #[error(transparent)]
    C32(#[from] C32Error),
    #[error("address hash must be 20 bytes, got {0}")]
    BadLength(usize),
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("private key is not valid hex")]
    Hex,
    #[error("private key must be 32 bytes (optionally followed by 01), got {0} bytes")]
    BadLength(usize),
    #[error("private key is out of range: {0}")]
    OutOfRange(#[from] secp256k1::Error),
}

/// A Stacks account address: c32 version plus the hash160 of the key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StacksAddress {
    version: u8,
    hash160: [u8; 20],
}

impl StacksAddress {
    /// `version` must be a single c32 digit (below 32).
    pub fn new(version: u8, hash160: [u8; 20]) -> Result<Self, AddressError> {
        if version >= 32 {
            return Err(AddressError::C32(C32Error::InvalidVersion(version)));
        }
        Ok(StacksAddress { version, hash160 })
    }

    /// Single-signature address of `public_key` on `network`.
    pub fn from_public_key(network: Network, public_key: &[u8]) -> Self {
        let sha = Sha256::digest(public_key);
        let mut hash160 = [0u8; 20];
        hash160.copy_from_slice(&Ripemd160::digest(sha));
        StacksAddress {
            version: network.address_version(),
            hash160,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash160(&self) -> &[u8; 20] {
        &self.hash160
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Every constructor keeps `version` below 32.
        match c32::check_encode(self.version, &self.hash160) {
            Ok(encoded) => write!(f, "S{}", encoded),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl fmt::Debug for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StacksAddress({})", self)
    }
}

impl FromStr for StacksAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .trim()
            .strip_prefix('S')
            .ok_or(AddressError::MissingPrefix)?;
        let (version, data) = c32::check_decode(rest)?;
        let hash160: [u8; 20] = data
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::BadLength(data.len()))?;

        Ok(StacksAddress { version, hash160 })
    }
}

/// secp256k1 signing key. `compressed` selects the public key encoding the
/// address and transaction auth are computed from.
#[derive(Clone)]
pub struct PrivateKey {
    secret: SecretKey,
    compressed: bool,
}

impl PrivateKey {
    pub fn new(secret: SecretKey, compressed: bool) -> Self {
        PrivateKey { secret, compressed }
    }

    /// Parses the hex forms wallets export: 32 bytes for an uncompressed key,
    /// or 32 bytes followed by `01` for a compressed one. A `0x` prefix is
    /// tolerated.
    pub fn from_hex(value: &str) -> Result<Self, KeyError> {
        let value = value.trim();
        let value = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(value).map_err(|_| KeyError::Hex)?;

        let compressed = match bytes.len() {
            32 => false,
            33 if bytes[32] == 0x01 => true,
            other => return Err(KeyError::BadLength(other)),
        };

        Ok(PrivateKey {
            secret: SecretKey::from_slice(&bytes[..32])?,
            compressed,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn public_key_bytes(&self) -> Vec<u8> {
        let public = PublicKey::from_secret_key(&SECP256K1, &self.secret);
        if self.compressed {
            public.serialize().to_vec()
        } else {
            public.serialize_uncompressed().to_vec()
        }
    }

    pub fn address(&self, network: Network) -> StacksAddress {
        StacksAddress::from_public_key(network, &self.public_key_bytes())
    }

    /// Recoverable ECDSA signature laid out as `recovery id ‖ r ‖ s`.
    pub fn sign_recoverable(&self, digest: &[u8; 32]) -> [u8; 65] {
        let message = Message::from_digest(*digest);
        let (recovery_id, compact) = SECP256K1
            .sign_ecdsa_recoverable(&message, &self.secret)
            .serialize_compact();

        let mut signature = [0u8; 65];
        signature[0] = recovery_id.to_i32() as u8;
        signature[1..].copy_from_slice(&compact);
        signature
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

/// A sender: signing key together with its address on the configured
/// network.
#[derive(Debug, Clone)]
pub struct Account {
    pub key: PrivateKey,
    pub address: StacksAddress,
}

impl Account {
    pub fn new(key: PrivateKey, network: Network) -> Self {
        let address = key.address(network);
        Account { key, address }
    }
}
