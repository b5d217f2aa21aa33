//! Command line arguments.

use crate::common::*;

/// The epoch count used when `--num_epochs` is absent or zero.
pub const DEFAULT_EPOCHS: usize = 200;

#[derive(Debug, Clone, StructOpt)]
/// Train a RetinaNet detector on a JSON-lines annotation file and export it.
pub struct Args {
    /// The JSON-lines annotation file.
    #[structopt(long = "dataset_file")]
    pub dataset_file: PathBuf,
    /// The directory to write the model artifact and the labels file to.
    #[structopt(long = "model_output_directory")]
    pub model_output_directory: PathBuf,
    /// Override the number of training epochs. Zero keeps the default.
    #[structopt(long = "num_epochs")]
    pub num_epochs: Option<usize>,
    /// Optional configuration file.
    #[structopt(long = "config_file")]
    pub config_file: Option<PathBuf>,
}

impl Args {
    /// The number of epochs to train, falling back to `default` when the
    /// override is absent or zero.
    pub fn resolve_epochs(&self, default: usize) -> usize {
        resolve_epochs(self.num_epochs, default)
    }
}

pub fn resolve_epochs(num_epochs: Option<usize>, default: usize) -> usize {
    match num_epochs {
        None | Some(0) => default,
        Some(epochs) => epochs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flags() {
        let args = Args::from_iter_safe([
            "train",
            "--dataset_file",
            "data.jsonl",
            "--model_output_directory",
            "out",
            "--num_epochs",
            "3",
        ])
        .unwrap();
        assert_eq!(args.dataset_file, PathBuf::from("data.jsonl"));
        assert_eq!(args.model_output_directory, PathBuf::from("out"));
        assert_eq!(args.num_epochs, Some(3));
        assert_eq!(args.config_file, None);
        assert_eq!(args.resolve_epochs(DEFAULT_EPOCHS), 3);
    }

    #[test]
    fn missing_required_flag() {
        assert!(Args::from_iter_safe(["train", "--dataset_file", "data.jsonl"]).is_err());
    }

    #[test]
    fn epoch_override() {
        assert_eq!(resolve_epochs(None, DEFAULT_EPOCHS), 200);
        assert_eq!(resolve_epochs(Some(0), DEFAULT_EPOCHS), 200);
        assert_eq!(resolve_epochs(Some(5), DEFAULT_EPOCHS), 5);
    }
}
