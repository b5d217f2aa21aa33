//! Per-record decoding, resizing and encoding.

use crate::{
    common::*,
    record::{AnnotationRecord, Sample},
};

/// Turns an [AnnotationRecord] into a [Sample].
///
/// The loader holds no mutable state, so one instance can serve any number
/// of records concurrently.
#[derive(Debug, Clone)]
pub struct RecordLoader {
    vocabulary: Arc<Vocabulary>,
    image_size: HW<u32>,
    source_format: BoxFormat,
    target_format: BoxFormat,
}

impl RecordLoader {
    /// Build a record loader.
    ///
    /// * `vocabulary` - Class names to encode labels with.
    /// * `image_size` - The output image size in pixels.
    /// * `source_format` - The box layout of the annotation records.
    /// * `target_format` - The box layout of the output samples.
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        image_size: HW<u32>,
        source_format: BoxFormat,
        target_format: BoxFormat,
    ) -> Result<Self> {
        ensure!(
            image_size.h() > 0 && image_size.w() > 0,
            "image height and width must be positive"
        );

        Ok(Self {
            vocabulary,
            image_size,
            source_format,
            target_format,
        })
    }

    pub fn target_format(&self) -> BoxFormat {
        self.target_format
    }

    /// Decode the image of `record` into 3 channels and resize it to the
    /// configured size, ignoring its aspect ratio. Labels are encoded with the
    /// vocabulary and boxes are converted to the target format.
    pub fn load(&self, record: &AnnotationRecord) -> Result<Sample> {
        let AnnotationRecord {
            image_path,
            labels,
            boxes,
        } = record;
        ensure!(
            labels.len() == boxes.len(),
            "'{}' has {} labels but {} boxes",
            image_path.display(),
            labels.len(),
            boxes.len()
        );

        let image = decode_rgb(image_path)?;
        let image = imageops::resize(
            &image,
            self.image_size.w(),
            self.image_size.h(),
            FilterType::Triangle,
        );

        let classes: Vec<usize> = labels
            .iter()
            .map(|label| {
                self.vocabulary
                    .encode(label)
                    .with_context(|| format!("cannot encode labels of '{}'", image_path.display()))
            })
            .try_collect()?;

        let size: HW<f64> = self.image_size.cast();
        let boxes: Vec<[f64; 4]> = boxes
            .iter()
            .map(|&coords| self.source_format.convert(coords, self.target_format, &size))
            .try_collect()
            .with_context(|| format!("invalid box in '{}'", image_path.display()))?;

        Ok(Sample {
            image,
            classes,
            boxes,
        })
    }
}

/// Decode an image file into 8-bit RGB, sniffing the format from its content.
pub fn decode_rgb(path: &Path) -> Result<RgbImage> {
    let image = image::io::Reader::open(path)
        .with_context(|| format!("failed to open image file '{}'", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read image file '{}'", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode image file '{}'", path.display()))?;
    Ok(image.to_rgb8())
}
