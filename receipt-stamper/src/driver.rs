use crate::{
    configuration::{BatchSettings, KeySettings},
    content::load_content,
    error::StampError,
    executor::{StampExecutor, StampResult},
    keys::load_key_entries,
    pool::{build_pools, Pools},
    progress::ProgressStore,
    random::RandomSource,
    retry::RetryPolicy,
    stacks::{ContractClient, Network},
};

/// Everything loaded once at startup.
#[derive(Debug, Clone)]
pub struct BatchInputs {
    pub content: Vec<String>,
    pub pools: Pools,
}

impl BatchInputs {
    pub async fn load(
        batch: &BatchSettings,
        keys: &KeySettings,
        network: Network,
    ) -> Result<BatchInputs, StampError> {
        let content = load_content(&batch.content_file)?;
        tracing::info!(items = content.len(), file = %batch.content_file.display(), "Content loaded");

        let entries = load_key_entries(keys.private_key.as_deref(), &keys.file)?;
        let pools = build_pools(&entries, keys, network).await?;

        Ok(BatchInputs { content, pools })
    }

    /// A run needs something to stamp and someone to sign it.
    pub fn ensure_runnable(&self) -> Result<(), StampError> {
        if self.content.is_empty() {
            return Err(StampError::Config("content queue is empty".to_string()));
        }
        if self.pools.senders.is_empty() {
            return Err(StampError::Config("sender pool is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Loaded,
    Running,
    Stamping { index: u64 },
    Waiting { index: u64 },
    Drained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items stamped by this run.
    pub stamped: u64,
    /// Cursor at exit; equals the queue length.
    pub cursor: u64,
}

/// Walks the content queue from the persisted cursor, one stamp at a time,
/// pausing `interval` between stamps.
pub struct BatchDriver<C, R> {
    inputs: BatchInputs,
    executor: StampExecutor<C, R>,
    progress: ProgressStore,
    stamp_retry: RetryPolicy,
    interval: std::time::Duration,
}

impl<C: ContractClient, R: RandomSource> BatchDriver<C, R> {
    pub fn new(
        inputs: BatchInputs,
        executor: StampExecutor<C, R>,
        progress: ProgressStore,
        settings: &BatchSettings,
    ) -> Self {
        BatchDriver {
            inputs,
            executor,
            progress,
            stamp_retry: settings.stamp_retry(),
            interval: settings.interval(),
        }
    }

    /// Runs until the queue is drained. An item that still fails after its
    /// retries ends the run; the cursor keeps pointing at it.
    pub async fn run(self) -> Result<BatchSummary, StampError> {
        let total = self.inputs.content.len() as u64;
        let mut stamped = 0;
        let mut state = BatchState::Loaded;

        loop {
            state = match state {
                BatchState::Loaded => {
                    self.inputs.ensure_runnable()?;
                    BatchState::Running
                }
                BatchState::Running => {
                    let index = self.progress.load();
                    tracing::info!(index, total, "Resuming from cursor");
                    if index >= total {
                        BatchState::Drained
                    } else {
                        BatchState::Stamping { index }
                    }
                }
                BatchState::Stamping { index } => {
                    let result = self.stamp_item(index).await?;
                    let next = index + 1;
                    self.progress.save(next)?;
                    stamped += 1;
                    tracing::info!(
                        index,
                        txid = %result.txid,
                        function = result.function_name,
                        sender = %result.sender_address,
                        recipient = ?result.recipient.map(|address| address.to_string()),
                        "Receipt stamped"
                    );

                    if next >= total {
                        BatchState::Drained
                    } else {
                        BatchState::Waiting { index: next }
                    }
                }
                BatchState::Waiting { index } => {
                    tracing::info!(next = index, "Waiting {}s before next stamp", self.interval.as_secs());
                    tokio::time::sleep(self.interval).await;
                    BatchState::Stamping { index }
                }
                BatchState::Drained => {
                    tracing::info!(stamped, total, "Content queue drained");
                    return Ok(BatchSummary {
                        stamped,
                        cursor: total,
                    });
                }
            };
        }
    }

    #[tracing::instrument(name = "Stamping content item", skip(self))]
    async fn stamp_item(&self, index: u64) -> Result<StampResult, StampError> {
        let text = self.inputs.content[index as usize].as_str();
        stamp_with_retry(&self.executor, &self.inputs.pools, text, self.stamp_retry).await
    }
}

async fn stamp_with_retry<C: ContractClient, R: RandomSource>(
    executor: &StampExecutor<C, R>,
    pools: &Pools,
    text: &str,
    retry: RetryPolicy,
) -> Result<StampResult, StampError> {
    retry
        .run(
            "stamp receipt",
            |_| executor.stamp(text, &pools.senders, &pools.recipients),
            StampError::is_retryable,
        )
        .await
}

/// Stamps one item without touching the cursor. `item` picks the content
/// index; a random item is stamped otherwise. The executor runs once: only
/// its own rate-limit retry applies, a failed stamp is left to the next
/// scheduled run.
pub async fn stamp_once<C: ContractClient, R: RandomSource>(
    inputs: &BatchInputs,
    executor: &StampExecutor<C, R>,
    item: Option<usize>,
) -> Result<StampResult, StampError> {
    inputs.ensure_runnable()?;

    let index = match item {
        Some(index) if index < inputs.content.len() => index,
        Some(index) => {
            return Err(StampError::Config(format!(
                "item {} is out of range, the queue has {} items",
                index,
                inputs.content.len()
            )))
        }
        None => executor.pick_index(inputs.content.len()),
    };
    tracing::info!(index, "Stamping a single item");

    executor
        .stamp(&inputs.content[index], &inputs.pools.senders, &inputs.pools.recipients)
        .await
}
