//! The epoch loop.

use crate::{
    common::*,
    model::{DetectionModel, LossOutput},
};
use retina_data::DatasetPartition;

/// Mean losses of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLosses {
    pub epoch: usize,
    /// `None` if the train partition has no batches.
    pub train: Option<LossOutput>,
    /// `None` if the validation partition has no batches.
    pub validation: Option<LossOutput>,
}

/// Per-epoch losses of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochLosses>,
}

impl History {
    pub fn last(&self) -> Option<&EpochLosses> {
        self.epochs.last()
    }
}

#[derive(Debug, Default)]
struct LossMean {
    classification: f64,
    box_regression: f64,
    count: usize,
}

impl LossMean {
    fn add(&mut self, loss: LossOutput) {
        self.classification += loss.classification;
        self.box_regression += loss.box_regression;
        self.count += 1;
    }

    fn mean(&self) -> Option<LossOutput> {
        (self.count > 0).then(|| LossOutput {
            classification: self.classification / self.count as f64,
            box_regression: self.box_regression / self.count as f64,
        })
    }
}

/// Train `model` for `epochs` passes over `train`, evaluating on
/// `validation` after each pass.
pub async fn fit<M>(
    model: &mut M,
    train: &DatasetPartition,
    validation: &DatasetPartition,
    epochs: usize,
) -> Result<History>
where
    M: DetectionModel,
{
    info!(
        "start training for {} epochs on {} images",
        epochs,
        train.len()
    );
    let mut history = History::default();

    for epoch in 0..epochs {
        let since = Instant::now();

        let train_loss = {
            let mut mean = LossMean::default();
            let mut stream = train.stream();

            while let Some(batch) = stream.next().await {
                let batch =
                    batch.with_context(|| format!("failed to load a batch in epoch {}", epoch))?;
                let loss = run_step(|| model.train_step(&batch))?;
                mean.add(loss);
            }
            mean.mean()
        };

        let validation_loss = evaluate(model, validation)
            .instrument(trace_span!("validation", epoch))
            .await?;

        info!(
            "epoch: {}/{}\tloss: {}\tval_loss: {}\telapsed: {:.2}s",
            epoch + 1,
            epochs,
            format_loss(train_loss.as_ref()),
            format_loss(validation_loss.as_ref()),
            since.elapsed().as_secs_f64()
        );

        history.epochs.push(EpochLosses {
            epoch,
            train: train_loss,
            validation: validation_loss,
        });
    }

    Ok(history)
}

/// Compute the mean losses over one pass of `partition`.
pub async fn evaluate<M>(model: &mut M, partition: &DatasetPartition) -> Result<Option<LossOutput>>
where
    M: DetectionModel,
{
    let mut mean = LossMean::default();
    let mut stream = partition.stream();

    while let Some(batch) = stream.next().await {
        let batch = batch?;
        mean.add(run_step(|| model.evaluate_step(&batch))?);
    }

    Ok(mean.mean())
}

/// Run a model step on the current worker thread while the runtime moves its
/// other tasks elsewhere, so the data stages keep running during the step.
///
/// Requires the multi-threaded runtime.
fn run_step<F>(step: F) -> Result<LossOutput>
where
    F: FnOnce() -> Result<LossOutput>,
{
    tokio::task::block_in_place(step)
}

fn format_loss(loss: Option<&LossOutput>) -> String {
    match loss {
        Some(loss) => format!(
            "{:.4} (cls {:.4}, box {:.4})",
            loss.total(),
            loss.classification,
            loss.box_regression
        ),
        None => "n/a".into(),
    }
}
