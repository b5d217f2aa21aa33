use super::pad::paste_top_left;
use crate::{common::*, record::RatioLabel};

/// Configuration of [JitteredResize].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JitteredResizeInit {
    /// The output image size.
    pub target_size: HW<u32>,
    /// The range of the factor applied to the target size before fitting.
    pub scale_range: (R64, R64),
}

impl JitteredResizeInit {
    pub fn build(self) -> Result<JitteredResize> {
        let Self {
            target_size,
            scale_range: (lo, hi),
        } = self;
        ensure!(
            target_size.h() > 0 && target_size.w() > 0,
            "target height and width must be positive"
        );
        ensure!(lo > 0.0, "scale min must be positive");
        ensure!(lo <= hi, "scale min must not exceed scale max");

        Ok(JitteredResize {
            target_size,
            scale_range: (lo.raw(), hi.raw()),
        })
    }
}

/// Randomly rescales the image, crops a random window of the target size out
/// of it and pads the bottom and right if the window is smaller.
///
/// Boxes follow the image and are clipped to the visible window. Boxes that
/// end up with no area are dropped.
#[derive(Debug, Clone)]
pub struct JitteredResize {
    target_size: HW<u32>,
    scale_range: (f64, f64),
}

impl JitteredResize {
    pub fn forward<R>(
        &self,
        image: RgbImage,
        labels: Vec<RatioLabel>,
        rng: &mut R,
    ) -> Result<(RgbImage, Vec<RatioLabel>)>
    where
        R: Rng + ?Sized,
    {
        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "cannot resize an empty image");
        let tgt_size: HW<f64> = self.target_size.cast();

        let scale = {
            let (lo, hi) = self.scale_range;
            if lo < hi {
                rng.gen_range(lo..hi)
            } else {
                lo
            }
        };
        let scaled_size = HW::from_hw([tgt_size.h() * scale, tgt_size.w() * scale]);
        let image_scale =
            HW::from_hw([height as f64, width as f64]).fit_scale(&scaled_size);
        let new_h = ((height as f64 * image_scale).round() as u32).max(1);
        let new_w = ((width as f64 * image_scale).round() as u32).max(1);

        let off_y = random_offset(new_h, self.target_size.h(), rng);
        let off_x = random_offset(new_w, self.target_size.w(), rng);
        let crop_h = (new_h - off_y).min(self.target_size.h());
        let crop_w = (new_w - off_x).min(self.target_size.w());

        let image = {
            let resized = imageops::resize(&image, new_w, new_h, FilterType::Triangle);
            let cropped = imageops::crop_imm(&resized, off_x, off_y, crop_w, crop_h).to_image();
            paste_top_left(&cropped, self.target_size)
        };

        // ratio -> resized pixels -> window pixels
        let to_window = Transform::from_sizes_exact(
            &HW::from_hw([1.0, 1.0]),
            &HW::from_hw([new_h as f64, new_w as f64]),
        )
        .then_translate(-(off_y as f64), -(off_x as f64));
        let to_ratio = Transform::from_sizes_exact(&tgt_size, &HW::from_hw([1.0, 1.0]));

        let labels = labels
            .into_iter()
            .filter_map(|label| {
                let rect = label
                    .rect
                    .transform(&to_window)
                    .clip_to(crop_h as f64, crop_w as f64)?
                    .transform(&to_ratio);
                Some(Label {
                    rect,
                    class: label.class,
                })
            })
            .collect();

        Ok((image, labels))
    }
}

fn random_offset<R>(len: u32, window: u32, rng: &mut R) -> u32
where
    R: Rng + ?Sized,
{
    let slack = len.saturating_sub(window);
    if slack == 0 {
        return 0;
    }
    ((slack as f64 * rng.gen::<f64>()).floor() as u32).min(slack)
}
