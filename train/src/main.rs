use anyhow::{Context, Result};
use std::sync::Arc;
use structopt::StructOpt;
use tch::Device;
use tracing::{info, trace_span, Instrument};
use train::{
    args::Args,
    config::Config,
    logging,
    tch_backend::{TorchScriptExporter, TorchScriptFactory},
    RunOptions,
};

#[tokio::main]
pub async fn main() -> Result<()> {
    logging::init_tracing()?;

    // parse arguments
    let args = Args::from_args();
    let config = match &args.config_file {
        Some(path) => Config::open(path)
            .with_context(|| format!("failed to load config file '{}'", path.display()))?,
        None => Config::default(),
    };
    let epochs = args.resolve_epochs(config.training.epochs.get());
    let config = Arc::new(config);

    let device = Device::cuda_if_available();
    info!("use device {:?}", device);
    let factory = TorchScriptFactory::from_config(&config.training, device);

    // start training program
    let output = train::start(
        config,
        RunOptions {
            dataset_file: args.dataset_file,
            model_output_directory: args.model_output_directory,
            epochs,
        },
        &factory,
        &TorchScriptExporter,
    )
    .instrument(trace_span!("train"))
    .await?;

    info!(
        "wrote '{}' and '{}'",
        output.model_file.display(),
        output.labels_file.display()
    );
    Ok(())
}
