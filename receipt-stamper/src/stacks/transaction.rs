//! Contract-call transactions in the Stacks wire format, signed with a
//! single P2PKH key.

use sha2::{Digest, Sha512_256};
use thiserror::Error;

use super::{
    address::{Network, PrivateKey, StacksAddress},
    clarity::ClarityValue,
};

const AUTH_TYPE_STANDARD: u8 = 0x04;
const HASH_MODE_P2PKH: u8 = 0x00;
const KEY_ENCODING_COMPRESSED: u8 = 0x00;
const KEY_ENCODING_UNCOMPRESSED: u8 = 0x01;
const ANCHOR_MODE_ANY: u8 = 0x03;
const POST_CONDITION_MODE_ALLOW: u8 = 0x01;
const PAYLOAD_CONTRACT_CALL: u8 = 0x02;
const MAX_NAME_LEN: usize = 128;
const SIGNATURE_LEN: usize = 65;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("{kind} name {name:?} must be 1 to 128 bytes")]
    BadName { kind: &'static str, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCallPayload {
    contract_address: StacksAddress,
    contract_name: String,
    function_name: String,
    args: Vec<ClarityValue>,
}

impl ContractCallPayload {
    pub fn new(
        contract_address: StacksAddress,
        contract_name: &str,
        function_name: &str,
        args: Vec<ClarityValue>,
    ) -> Result<Self, TransactionError> {
        check_name("contract", contract_name)?;
        check_name("function", function_name)?;

        Ok(ContractCallPayload {
            contract_address,
            contract_name: contract_name.to_string(),
            function_name: function_name.to_string(),
            args,
        })
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.push(PAYLOAD_CONTRACT_CALL);
        out.push(self.contract_address.version());
        out.extend_from_slice(self.contract_address.hash160());
        out.push(self.contract_name.len() as u8);
        out.extend_from_slice(self.contract_name.as_bytes());
        out.push(self.function_name.len() as u8);
        out.extend_from_slice(self.function_name.as_bytes());
        out.extend_from_slice(&(self.args.len() as u32).to_be_bytes());
        for arg in &self.args {
            arg.serialize_into(out);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize_into(&mut out);
        out
    }
}

fn check_name(kind: &'static str, name: &str) -> Result<(), TransactionError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(TransactionError::BadName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// A contract call with its origin fixed but not yet signed.
#[derive(Debug, Clone)]
pub struct UnsignedContractCall {
    network: Network,
    payload: ContractCallPayload,
    signer: [u8; 20],
    key_encoding: u8,
    nonce: u64,
    fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub txid: String,
    pub bytes: Vec<u8>,
    pub nonce: u64,
    pub fee: u64,
}

impl UnsignedContractCall {
    pub fn new(network: Network, payload: ContractCallPayload, origin: &PrivateKey, nonce: u64) -> Self {
        let signer = *origin.address(network).hash160();
        let key_encoding = if origin.is_compressed() {
            KEY_ENCODING_COMPRESSED
        } else {
            KEY_ENCODING_UNCOMPRESSED
        };

        UnsignedContractCall {
            network,
            payload,
            signer,
            key_encoding,
            nonce,
            fee: 0,
        }
    }

    pub fn payload(&self) -> &ContractCallPayload {
        &self.payload
    }

    pub fn set_fee(&mut self, fee: u64) {
        self.fee = fee;
    }

    /// Length of the signed transaction; signatures are fixed-size.
    pub fn estimated_len(&self) -> usize {
        self.serialize(&[0u8; SIGNATURE_LEN], self.nonce, self.fee).len()
    }

    pub fn sign(self, origin: &PrivateKey) -> SignedTransaction {
        let cleared = self.serialize(&[0u8; SIGNATURE_LEN], 0, 0);
        let initial_sighash = sha512_256(&cleared);

        let mut presign = Vec::with_capacity(32 + 1 + 8 + 8);
        presign.extend_from_slice(&initial_sighash);
        presign.push(AUTH_TYPE_STANDARD);
        presign.extend_from_slice(&self.fee.to_be_bytes());
        presign.extend_from_slice(&self.nonce.to_be_bytes());
        let presign_sighash = sha512_256(&presign);

        let signature = origin.sign_recoverable(&presign_sighash);
        let bytes = self.serialize(&signature, self.nonce, self.fee);

        SignedTransaction {
            txid: hex::encode(sha512_256(&bytes)),
            bytes,
            nonce: self.nonce,
            fee: self.fee,
        }
    }

    fn serialize(&self, signature: &[u8; SIGNATURE_LEN], nonce: u64, fee: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.push(self.network.transaction_version());
        out.extend_from_slice(&self.network.chain_id().to_be_bytes());

        out.push(AUTH_TYPE_STANDARD);
        out.push(HASH_MODE_P2PKH);
        out.extend_from_slice(&self.signer);
        out.extend_from_slice(&nonce.to_be_bytes());
        out.extend_from_slice(&fee.to_be_bytes());
        out.push(self.key_encoding);
        out.extend_from_slice(signature);

        out.push(ANCHOR_MODE_ANY);
        out.push(POST_CONDITION_MODE_ALLOW);
        // no post-conditions
        out.extend_from_slice(&0u32.to_be_bytes());

        self.payload.serialize_into(&mut out);
        out
    }
}

fn sha512_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha512_256::digest(data));
    out
}
