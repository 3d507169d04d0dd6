use crate::{
    configuration::{NetworkSettings, Settings},
    driver::{stamp_once, BatchDriver, BatchInputs, BatchSummary},
    error::StampError,
    executor::{StampExecutor, StampResult},
    progress::ProgressStore,
    random::StdRandom,
    stacks::{StacksAddress, StacksClient},
};

pub mod configuration;
pub mod content;
pub mod driver;
pub mod error;
pub mod executor;
pub mod keys;
pub mod pid;
pub mod pool;
pub mod progress;
pub mod random;
pub mod retry;
pub mod stacks;
pub mod telemetry;

pub fn stacks_client(settings: &NetworkSettings) -> Result<StacksClient, StampError> {
    let contract_address: StacksAddress = settings.contract_address.parse().map_err(|e| {
        StampError::Config(format!(
            "contract address {:?} is invalid: {}",
            settings.contract_address, e
        ))
    })?;

    Ok(StacksClient::new(
        settings.api_url(),
        settings.network,
        contract_address,
        &settings.contract_name,
    ))
}

fn executor(settings: &Settings) -> Result<StampExecutor<StacksClient, StdRandom>, StampError> {
    Ok(StampExecutor::new(
        stacks_client(&settings.network)?,
        StdRandom::from_entropy(),
        settings.network.fee,
        settings.batch.build_retry(),
    ))
}

/// Loads inputs, resumes from the progress file and stamps until the
/// content queue is drained.
#[tracing::instrument(name = "Running stamp batch", skip(settings))]
pub async fn run_batch(settings: &Settings) -> Result<BatchSummary, StampError> {
    let executor = executor(settings)?;
    let inputs = BatchInputs::load(&settings.batch, &settings.keys, settings.network.network).await?;
    let progress = ProgressStore::new(&settings.batch.progress_file);

    BatchDriver::new(inputs, executor, progress, &settings.batch)
        .run()
        .await
}

/// Stamps a single content item (`item`, or a random one).
#[tracing::instrument(name = "Running single stamp", skip(settings))]
pub async fn run_once(settings: &Settings, item: Option<usize>) -> Result<StampResult, StampError> {
    let executor = executor(settings)?;
    let inputs = BatchInputs::load(&settings.batch, &settings.keys, settings.network.network).await?;

    stamp_once(&inputs, &executor, item).await
}
