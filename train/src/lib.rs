//! The training program: loads annotations, trains a detector and exports it
//! along with its labels.

pub mod args;
pub mod common;
pub mod config;
pub mod export;
pub mod fit;
pub mod logging;
pub mod model;
#[cfg(feature = "tch")]
pub mod tch_backend;

use crate::{
    common::*,
    config::Config,
    export::ModelExporter,
    fit::History,
    model::{LossOutput, ModelFactory, ModelSpec},
};
use retina_data::{load_annotations, DatasetBuilderInit};

/// Where the training run reads from and writes to.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dataset_file: PathBuf,
    pub model_output_directory: PathBuf,
    pub epochs: usize,
}

/// The results of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub history: History,
    /// The mean losses on the test partition, if it has any batches.
    pub test_loss: Option<LossOutput>,
    pub labels_file: PathBuf,
    pub model_file: PathBuf,
}

/// The entry of training program.
///
/// Must run on the multi-threaded tokio runtime.
pub async fn start<F, X>(
    config: Arc<Config>,
    options: RunOptions,
    factory: &F,
    exporter: &X,
) -> Result<TrainOutput>
where
    F: ModelFactory,
    X: ModelExporter<F::Model>,
{
    let RunOptions {
        dataset_file,
        model_output_directory,
        epochs,
    } = options;
    ensure!(epochs > 0, "the number of epochs must be positive");

    let vocabulary = Arc::new(Vocabulary::new(config.dataset.labels.iter().cloned())?);

    // parse annotations
    info!("loading annotations from '{}'", dataset_file.display());
    let annotations = {
        let vocabulary = vocabulary.clone();
        tokio::task::spawn_blocking(move || load_annotations(&dataset_file, &vocabulary))
            .await??
    };

    // build partitions
    let partitions = {
        let dataset = &config.dataset;
        let preprocessor = &config.preprocessor;

        DatasetBuilderInit {
            vocabulary: vocabulary.clone(),
            image_size: preprocessor.image_size()?,
            source_format: dataset.source_box_format,
            target_format: dataset.target_box_format,
            train_split: dataset.train_split,
            batch_size: config.training.global_batch_size(),
            shuffle_buffer: dataset.shuffle_buffer.get(),
            max_boxes: preprocessor.max_boxes.get(),
            overflow: preprocessor.overflow_policy,
            flip_prob: preprocessor.flip_prob,
            jitter_scale: preprocessor.jitter_scale,
            num_workers: preprocessor.num_workers.map(|n| n.get()),
            prefetch: preprocessor.prefetch.map(|n| n.get()),
            seed: dataset.seed,
        }
        .build()?
        .build(annotations)?
    };

    // train
    let spec = ModelSpec::from_config(&config, vocabulary.len());
    let mut model = factory.build(&spec)?;
    let history = fit::fit(&mut model, &partitions.train, &partitions.validation, epochs)
        .instrument(info_span!("fit"))
        .await?;

    let test_loss = fit::evaluate(&mut model, &partitions.test).await?;
    if let Some(loss) = &test_loss {
        info!(
            "test loss: {:.4} (cls {:.4}, box {:.4})",
            loss.total(),
            loss.classification,
            loss.box_regression
        );
    }

    // save outputs
    let labels_file = export::save_labels(&vocabulary, &config.export, &model_output_directory)?;
    let model_file = tokio::task::block_in_place(|| {
        export::export_model(
            exporter,
            model,
            &config.export,
            &model_output_directory,
            config.preprocessor.target_shape,
        )
    })?;

    Ok(TrainOutput {
        history,
        test_loss,
        labels_file,
        model_file,
    })
}
