use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::{
    address::{Account, Network, StacksAddress},
    clarity::ClarityValue,
    transaction::{ContractCallPayload, SignedTransaction, TransactionError, UnsignedContractCall},
};

pub const SUBMIT_RECEIPT: &str = "submit-receipt";
pub const SUBMIT_RECEIPT_FOR: &str = "submit-receipt-for";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("rate limited (429 Too Many Requests): {0}")]
    RateLimited(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl ClientError {
    /// Transient throttling by the API; worth another attempt after a pause.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            ClientError::RateLimited(_) | ClientError::Status { status: 429, .. }
        )
    }
}

/// The two entry points of the receipt contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptCall {
    SubmitReceipt { text: String },
    SubmitReceiptFor { text: String, recipient: StacksAddress },
}

impl ReceiptCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            ReceiptCall::SubmitReceipt { .. } => SUBMIT_RECEIPT,
            ReceiptCall::SubmitReceiptFor { .. } => SUBMIT_RECEIPT_FOR,
        }
    }

    pub fn recipient(&self) -> Option<&StacksAddress> {
        match self {
            ReceiptCall::SubmitReceipt { .. } => None,
            ReceiptCall::SubmitReceiptFor { recipient, .. } => Some(recipient),
        }
    }

    pub fn args(&self) -> Vec<ClarityValue> {
        match self {
            ReceiptCall::SubmitReceipt { text } => vec![ClarityValue::StringUtf8(text.clone())],
            ReceiptCall::SubmitReceiptFor { text, recipient } => vec![
                ClarityValue::StringUtf8(text.clone()),
                ClarityValue::StandardPrincipal(*recipient),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Accepted { txid: String },
    Rejected { reason: String, txid: Option<String> },
}

/// Builds, signs and broadcasts receipt contract calls.
#[async_trait]
pub trait ContractClient: Send + Sync {
    /// Resolves nonce and fee (unless `fee` is fixed) and signs the call.
    async fn build_call(
        &self,
        call: &ReceiptCall,
        sender: &Account,
        fee: Option<u64>,
    ) -> Result<SignedTransaction, ClientError>;

    async fn broadcast(&self, transaction: &SignedTransaction) -> Result<BroadcastOutcome, ClientError>;
}

#[async_trait]
impl<T: ContractClient + ?Sized> ContractClient for Arc<T> {
    async fn build_call(
        &self,
        call: &ReceiptCall,
        sender: &Account,
        fee: Option<u64>,
    ) -> Result<SignedTransaction, ClientError> {
        (**self).build_call(call, sender, fee).await
    }

    async fn broadcast(&self, transaction: &SignedTransaction) -> Result<BroadcastOutcome, ClientError> {
        (**self).broadcast(transaction).await
    }
}

#[derive(Deserialize)]
struct NonceInfo {
    possible_next_nonce: u64,
}

#[derive(Deserialize)]
struct FeeEstimate {
    fee: u64,
}

#[derive(Deserialize)]
struct FeeEstimation {
    estimations: Vec<FeeEstimate>,
}

#[derive(Deserialize)]
struct Rejection {
    error: String,
    reason: Option<String>,
    txid: Option<String>,
}

/// `ContractClient` backed by a Stacks node / Hiro API endpoint.
#[derive(Debug, Clone)]
pub struct StacksClient {
    http: reqwest::Client,
    api_url: String,
    network: Network,
    contract_address: StacksAddress,
    contract_name: String,
}

impl StacksClient {
    pub fn new(
        api_url: &str,
        network: Network,
        contract_address: StacksAddress,
        contract_name: &str,
    ) -> StacksClient {
        StacksClient {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            network,
            contract_address,
            contract_name: contract_name.to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn contract_address(&self) -> &StacksAddress {
        &self.contract_address
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    #[tracing::instrument(name = "Fetching account nonce", skip(self))]
    pub async fn fetch_nonce(&self, address: &StacksAddress) -> Result<u64, ClientError> {
        let url = format!("{}/extended/v1/address/{}/nonces", self.api_url, address);
        let response = check_status(self.http.get(url).send().await?).await?;
        let info: NonceInfo = response.json().await?;

        Ok(info.possible_next_nonce)
    }

    /// Middle of the node's three fee estimates. Nodes without enough fee
    /// history answer `NoEstimateAvailable`; the transfer fee rate times the
    /// transaction length is used then.
    #[tracing::instrument(name = "Estimating contract call fee", skip(self, payload))]
    pub async fn estimate_fee(&self, payload: &[u8], estimated_len: usize) -> Result<u64, ClientError> {
        let url = format!("{}/v2/fees/transaction", self.api_url);
        let body = json!({
            "transaction_payload": hex::encode(payload),
            "estimated_len": estimated_len,
        });
        let response = self.http.post(url).json(&body).send().await?;

        match check_status(response).await {
            Ok(response) => {
                let estimation: FeeEstimation = response.json().await?;
                estimation
                    .estimations
                    .get(1)
                    .or_else(|| estimation.estimations.first())
                    .map(|estimate| estimate.fee)
                    .ok_or_else(|| ClientError::Decode("fee estimation list is empty".to_string()))
            }
            Err(ClientError::Status { body, .. }) if body.contains("NoEstimateAvailable") => {
                tracing::debug!("No fee estimate available, falling back to transfer fee rate");
                let rate = self.transfer_fee_rate().await?;
                Ok(rate * estimated_len as u64)
            }
            Err(e) => Err(e),
        }
    }

    async fn transfer_fee_rate(&self) -> Result<u64, ClientError> {
        let url = format!("{}/v2/fees/transfer", self.api_url);
        let response = check_status(self.http.get(url).send().await?).await?;
        let rate: u64 = response.json().await?;

        Ok(rate)
    }
}

#[async_trait]
impl ContractClient for StacksClient {
    async fn build_call(
        &self,
        call: &ReceiptCall,
        sender: &Account,
        fee: Option<u64>,
    ) -> Result<SignedTransaction, ClientError> {
        let payload = ContractCallPayload::new(
            self.contract_address,
            &self.contract_name,
            call.function_name(),
            call.args(),
        )?;
        let nonce = self.fetch_nonce(&sender.address).await?;
        let mut unsigned = UnsignedContractCall::new(self.network, payload, &sender.key, nonce);

        let fee = match fee {
            Some(fee) => fee,
            None => {
                self.estimate_fee(&unsigned.payload().to_bytes(), unsigned.estimated_len())
                    .await?
            }
        };
        unsigned.set_fee(fee);

        Ok(unsigned.sign(&sender.key))
    }

    #[tracing::instrument(name = "Broadcasting transaction", skip(self, transaction), fields(txid = %transaction.txid))]
    async fn broadcast(&self, transaction: &SignedTransaction) -> Result<BroadcastOutcome, ClientError> {
        let url = format!("{}/v2/transactions", self.api_url);
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(transaction.bytes.clone())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited(body));
        }
        if status.is_success() {
            let txid: String = serde_json::from_str(&body)
                .map_err(|e| ClientError::Decode(format!("broadcast response {:?}: {}", body, e)))?;
            return Ok(BroadcastOutcome::Accepted { txid });
        }

        match serde_json::from_str::<Rejection>(&body) {
            Ok(rejection) => Ok(BroadcastOutcome::Rejected {
                reason: rejection.reason.unwrap_or(rejection.error),
                txid: rejection.txid,
            }),
            Err(_) => Err(ClientError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ClientError::RateLimited(body));
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        body: summarize(&body),
    })
}

// Error bodies can be HTML pages from a proxy; keep the JSON reason if any.
fn summarize(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gift_call_carries_recipient_principal() {
        let recipient = StacksAddress::new(22, [3; 20]).unwrap();
        let call = ReceiptCall::SubmitReceiptFor {
            text: "for you".to_string(),
            recipient,
        };

        assert_eq!(call.function_name(), "submit-receipt-for");
        assert_eq!(call.recipient(), Some(&recipient));
        assert_eq!(
            call.args(),
            vec![
                ClarityValue::StringUtf8("for you".to_string()),
                ClarityValue::StandardPrincipal(recipient),
            ]
        );
    }

    #[test]
    fn rate_limit_detection_reads_the_status_only() {
        assert!(ClientError::RateLimited(String::new()).is_rate_limited());
        assert!(ClientError::Status {
            status: 429,
            body: String::new()
        }
        .is_rate_limited());
        assert!(!ClientError::Status {
            status: 500,
            body: "boom".to_string()
        }
        .is_rate_limited());
    }

    #[test]
    fn bodies_mentioning_429_are_not_rate_limits() {
        let low_fee = ClientError::Status {
            status: 400,
            body: r#"{"error":"fee 4290 too low"}"#.to_string(),
        };
        let decode = ClientError::Decode("upstream said Too Many Requests".to_string());

        assert!(!low_fee.is_rate_limited());
        assert!(!decode.is_rate_limited());
    }
}
