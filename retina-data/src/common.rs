pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use bbox::{prelude::*, BoxFormat, Transform, HW, TLBR};
pub use derivative::Derivative;
pub use futures::stream::{self, BoxStream, Stream, StreamExt as _, TryStreamExt as _};
pub use image::{
    imageops::{self, FilterType},
    RgbImage,
};
pub use itertools::{izip, Itertools as _};
pub use label::{Label, Vocabulary};
pub use ndarray::{Array2, Array3, Array4};
pub use noisy_float::prelude::*;
pub use par_stream::prelude::*;
pub use rand::{prelude::*, rngs::StdRng};
pub use serde::{
    de::Error as _, Deserialize, Deserializer, Serialize, Serializer,
};
pub use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    mem,
    num::NonZeroUsize,
    ops::Range,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
pub use tracing::{debug, info, trace_span, warn};

unzip_n::unzip_n!(pub 3);
