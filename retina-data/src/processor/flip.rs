use crate::{common::*, ratio::Ratio, record::RatioLabel};

/// Configuration of [RandomHorizontalFlip].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RandomHorizontalFlipInit {
    /// The probability to mirror each image.
    pub prob: Ratio,
}

impl RandomHorizontalFlipInit {
    pub fn build(self) -> Result<RandomHorizontalFlip> {
        let Self { prob } = self;
        Ok(RandomHorizontalFlip {
            prob: prob.to_f64(),
        })
    }
}

impl Default for RandomHorizontalFlipInit {
    fn default() -> Self {
        Self {
            prob: Ratio::half(),
        }
    }
}

/// Mirrors images left to right at random, moving boxes along.
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    prob: f64,
}

impl RandomHorizontalFlip {
    pub fn forward<R>(
        &self,
        image: RgbImage,
        labels: Vec<RatioLabel>,
        rng: &mut R,
    ) -> (RgbImage, Vec<RatioLabel>)
    where
        R: Rng + ?Sized,
    {
        if self.prob > 0.0 && rng.gen_bool(self.prob) {
            flip_lr(image, labels)
        } else {
            (image, labels)
        }
    }
}

fn flip_lr(mut image: RgbImage, labels: Vec<RatioLabel>) -> (RgbImage, Vec<RatioLabel>) {
    imageops::flip_horizontal_in_place(&mut image);
    let labels = labels
        .into_iter()
        .map(|label| label.map_rect(|rect| rect.flip_lr(1.0)))
        .collect();
    (image, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    fn fixture() -> (RgbImage, Vec<RatioLabel>) {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        let labels = vec![Label {
            rect: TLBR::from_tlbr([0.0, 0.0, 0.5, 0.25]),
            class: 1,
        }];
        (image, labels)
    }

    #[test]
    fn always_flip() {
        let flip = RandomHorizontalFlipInit {
            prob: Ratio::one(),
        }
        .build()
        .unwrap();
        let (image, labels) = fixture();
        let mut rng = StdRng::seed_from_u64(7);
        let (image, labels) = flip.forward(image, labels, &mut rng);

        assert_eq!(image.get_pixel(3, 0), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(labels[0].class, 1);
        let [t, l, b, r] = labels[0].rect.tlbr();
        assert_abs_diff_eq!(t, 0.0);
        assert_abs_diff_eq!(l, 0.75);
        assert_abs_diff_eq!(b, 0.5);
        assert_abs_diff_eq!(r, 1.0);
    }

    #[test]
    fn never_flip() {
        let flip = RandomHorizontalFlipInit {
            prob: Ratio::zero(),
        }
        .build()
        .unwrap();
        let (image, labels) = fixture();
        let mut rng = StdRng::seed_from_u64(7);
        let (out_image, out_labels) = flip.forward(image.clone(), labels.clone(), &mut rng);
        assert_eq!(out_image, image);
        assert_eq!(out_labels, labels);
    }

    #[test]
    fn flip_twice_restores() {
        let (image, labels) = fixture();
        let (once_image, once_labels) = flip_lr(image.clone(), labels.clone());
        let (twice_image, twice_labels) = flip_lr(once_image, once_labels);
        assert_eq!(twice_image, image);
        for (lhs, rhs) in twice_labels.iter().zip(&labels) {
            for (a, b) in lhs.rect.tlbr().iter().zip(rhs.rect.tlbr().iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-12);
            }
        }
    }
}
