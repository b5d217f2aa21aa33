//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use bbox::{BoxFormat, HW};
pub use derivative::Derivative;
pub use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
pub use image::RgbImage;
pub use itertools::Itertools;
pub use label::Vocabulary;
pub use ndarray::{Array2, Array3, Array4};
pub use noisy_float::prelude::*;
pub use retina_data::{DenseBatch, Ratio};
pub use serde::{Deserialize, Serialize};
pub use std::{
    env, fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
pub use structopt::StructOpt;
pub use tracing::{debug, info, info_span, trace_span, warn, Instrument};
