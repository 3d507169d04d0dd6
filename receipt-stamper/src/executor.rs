use std::sync::{Mutex, PoisonError};

use crate::{
    error::StampError,
    random::RandomSource,
    retry::RetryPolicy,
    stacks::{Account, BroadcastOutcome, ClientError, ContractClient, ReceiptCall, StacksAddress},
};

/// The contract rejects longer receipts.
pub const MAX_RECEIPT_CHARS: usize = 160;
const GIFT_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampResult {
    pub txid: String,
    pub function_name: &'static str,
    pub sender_address: StacksAddress,
    pub recipient: Option<StacksAddress>,
}

/// Trimmed receipt text, if it is 1 to 160 characters long.
pub fn validate_text(text: &str) -> Result<&str, StampError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(StampError::Validation("text is empty".to_string()));
    }
    let chars = text.chars().count();
    if chars > MAX_RECEIPT_CHARS {
        return Err(StampError::Validation(format!(
            "text is {} characters, the limit is {}",
            chars, MAX_RECEIPT_CHARS
        )));
    }
    Ok(text)
}

/// Submits one receipt: picks a sender and maybe a recipient, builds the
/// contract call (retrying while rate limited) and broadcasts it.
pub struct StampExecutor<C, R> {
    client: C,
    random: Mutex<R>,
    fee: Option<u64>,
    build_retry: RetryPolicy,
}

impl<C: ContractClient, R: RandomSource> StampExecutor<C, R> {
    pub fn new(client: C, random: R, fee: Option<u64>, build_retry: RetryPolicy) -> Self {
        StampExecutor {
            client,
            random: Mutex::new(random),
            fee,
            build_retry,
        }
    }

    /// Uniform index in `0..len` from the executor's random source.
    pub fn pick_index(&self, len: usize) -> usize {
        self.random
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .index(len)
    }

    /// Picks the sender and the call. A recipient drawn equal to the
    /// sender's own address is never gifted to.
    pub fn choose_call(
        &self,
        text: &str,
        senders: &[Account],
        recipients: &[StacksAddress],
    ) -> (usize, ReceiptCall) {
        let mut random = self.random.lock().unwrap_or_else(PoisonError::into_inner);

        let sender = random.index(senders.len());
        let candidate = if recipients.is_empty() {
            None
        } else {
            Some(recipients[random.index(recipients.len())])
        };
        let usable = candidate.filter(|recipient| *recipient != senders[sender].address);

        let call = match usable {
            Some(recipient) if random.chance(GIFT_PROBABILITY) => ReceiptCall::SubmitReceiptFor {
                text: text.to_string(),
                recipient,
            },
            _ => ReceiptCall::SubmitReceipt {
                text: text.to_string(),
            },
        };
        (sender, call)
    }

    #[tracing::instrument(
        name = "Stamping receipt",
        skip(self, senders, recipients),
        fields(chars = text.chars().count())
    )]
    pub async fn stamp(
        &self,
        text: &str,
        senders: &[Account],
        recipients: &[StacksAddress],
    ) -> Result<StampResult, StampError> {
        let text = validate_text(text)?;
        if senders.is_empty() {
            return Err(StampError::Config("sender pool is empty".to_string()));
        }

        let (sender_index, call) = self.choose_call(text, senders, recipients);
        let sender = &senders[sender_index];
        tracing::info!(
            function = call.function_name(),
            sender = %sender.address,
            recipient = ?call.recipient().map(ToString::to_string),
            "Building contract call"
        );

        let client = &self.client;
        let fee = self.fee;
        let transaction = self
            .build_retry
            .run(
                "build contract call",
                |_| client.build_call(&call, sender, fee),
                ClientError::is_rate_limited,
            )
            .await
            .map_err(StampError::Build)?;

        match self.client.broadcast(&transaction).await {
            Ok(BroadcastOutcome::Accepted { txid }) => Ok(StampResult {
                txid,
                function_name: call.function_name(),
                sender_address: sender.address,
                recipient: call.recipient().copied(),
            }),
            Ok(BroadcastOutcome::Rejected { reason, txid }) => Err(StampError::Broadcast { reason, txid }),
            Err(e) => Err(StampError::Broadcast {
                reason: e.to_string(),
                txid: None,
            }),
        }
    }
}
