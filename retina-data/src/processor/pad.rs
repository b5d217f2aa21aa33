use crate::{common::*, record::RatioLabel};

/// Configuration of [ResizeWithPad].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResizeWithPadInit {
    pub target_size: HW<u32>,
}

impl ResizeWithPadInit {
    pub fn build(self) -> Result<ResizeWithPad> {
        let Self { target_size } = self;
        ensure!(
            target_size.h() > 0 && target_size.w() > 0,
            "target height and width must be positive"
        );
        Ok(ResizeWithPad { target_size })
    }
}

/// Resizes images to fit the target size while keeping the aspect ratio.
///
/// The resized image is placed at the top-left corner and the remaining
/// bottom and right region is filled with zeros.
#[derive(Debug, Clone)]
pub struct ResizeWithPad {
    target_size: HW<u32>,
}

impl ResizeWithPad {
    pub fn target_size(&self) -> HW<u32> {
        self.target_size
    }

    /// Resize and pad the image alone.
    pub fn forward_image(&self, image: &RgbImage) -> Result<RgbImage> {
        let (_, image) = self.resize(image)?;
        Ok(image)
    }

    /// Resize and pad the image, mapping the boxes onto the padded canvas.
    pub fn forward(
        &self,
        image: RgbImage,
        labels: Vec<RatioLabel>,
    ) -> Result<(RgbImage, Vec<RatioLabel>)> {
        let (transform, image) = self.resize(&image)?;
        let labels = labels
            .iter()
            .map(|label| &transform * label)
            .collect();
        Ok((image, labels))
    }

    /// Returns the image and the transform from source ratio units to
    /// target ratio units.
    fn resize(&self, image: &RgbImage) -> Result<(Transform<f64>, RgbImage)> {
        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "cannot resize an empty image");

        let src_size: HW<f64> = HW::from_hw([height as f64, width as f64]);
        let tgt_size: HW<f64> = self.target_size.cast();
        let scale = src_size.fit_scale(&tgt_size);
        let new_h = scaled_len(height, scale, self.target_size.h());
        let new_w = scaled_len(width, scale, self.target_size.w());

        let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
        let canvas = paste_top_left(&resized, self.target_size);

        let transform = Transform::from_sizes_exact(
            &tgt_size,
            &HW::from_hw([new_h as f64, new_w as f64]),
        );
        Ok((transform, canvas))
    }
}

fn scaled_len(len: u32, scale: f64, max: u32) -> u32 {
    ((len as f64 * scale).round() as u32).clamp(1, max)
}

/// Place `image` on a zero canvas of `size` at the top-left corner.
///
/// Parts of the image outside the canvas are cut off.
pub(crate) fn paste_top_left(image: &RgbImage, size: HW<u32>) -> RgbImage {
    if image.dimensions() == (size.w(), size.h()) {
        return image.clone();
    }
    let mut canvas = RgbImage::new(size.w(), size.h());
    imageops::replace(&mut canvas, image, 0, 0);
    canvas
}
